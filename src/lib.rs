//! # auction-relay
//!
//! Replicated live-auction server. Any number of identical replicas sit
//! behind a load balancer; viewers connect to whichever replica they land on
//! and still see one auction, one price, and one `end`.
//!
//! Replicas hold no auction state of their own. The record lives in a shared
//! store that every bid and tick mutates through single atomic operations,
//! and every change is fanned out to all replicas over an update channel.
//!
//! ## Architecture
//!
//! ```text
//! Viewers (WebSocket)          Operators (REST)
//!     │                            │
//!     ├── ws/ connection ──────────┤── api/ handlers
//!     │                            │
//!     │        AuctionService + Countdown (service/)
//!     │            │                     │
//!     │      StateStore (store/)   UpdateChannel (channel/)
//!     │                                  │
//!     └── ConnectionRegistry ◄── Relay ◄─┘
//!
//!          BidRecorder (persistence/) ◄── accepted bids, write-behind
//! ```

pub mod api;
pub mod app_state;
pub mod channel;
pub mod config;
pub mod domain;
pub mod error;
pub mod persistence;
pub mod replica;
pub mod service;
pub mod store;
pub mod ws;
