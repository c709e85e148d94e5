//! Domain layer: the shared auction record, bids, and state-change events.
//!
//! These types are backend-agnostic. The store decodes [`AuctionState`]
//! snapshots from raw keys, the service turns bids and ticks into
//! [`StateChangeEvent`]s, and the WebSocket layer forwards them.

pub mod auction_state;
pub mod run_id;
pub mod state_event;

pub use auction_state::{
    AuctionField, AuctionRules, AuctionState, BidOutcome, BidRequest, HOUSE_BIDDER, MAX_NAME_CHARS,
    RejectReason, SOLD_MESSAGE, StartRequest,
};
pub use run_id::RunId;
pub use state_event::StateChangeEvent;
