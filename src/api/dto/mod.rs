//! Data Transfer Objects for REST request/response serialization.
//!
//! Request bodies reuse the domain's [`crate::domain::BidRequest`] and
//! [`crate::domain::StartRequest`], so REST and WebSocket accept the same
//! fields.

pub mod auction_dto;
pub mod common_dto;

pub use auction_dto::*;
pub use common_dto::*;
