//! Service layer: auction command orchestration.
//!
//! [`AuctionService`] executes `start` and the atomic bid protocol against
//! the shared [`crate::store::StateStore`] and announces every change on the
//! [`crate::channel::UpdateChannel`]. [`Countdown`] drives the clock.

pub mod auction_service;
pub mod countdown;

pub use auction_service::AuctionService;
pub use countdown::{Countdown, TickOutcome};
