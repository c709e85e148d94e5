//! The shared auction record and the inputs that mutate it.
//!
//! [`AuctionState`] is never held as ground truth by a replica: it is a
//! snapshot decoded from the independently addressable [`AuctionField`]
//! keys of the shared store.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::RunId;

/// High bidder recorded by `start` before anyone has bid.
pub const HOUSE_BIDDER: &str = "House";

/// Terminal message published with every `end` event.
pub const SOLD_MESSAGE: &str = "SOLD!";

/// Longest item or bidder name accepted, in characters. Matches the `bids`
/// columns and keeps every event well inside a `pg_notify` payload.
pub const MAX_NAME_CHARS: usize = 255;

/// Independently addressable keys of the shared auction record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AuctionField {
    /// Name of the item under the hammer.
    Item,
    /// Current highest accepted price.
    Price,
    /// Name of the current high bidder.
    Bidder,
    /// Seconds remaining on the countdown.
    TimeLeft,
    /// Whether the auction accepts bids.
    Running,
    /// Identifier of the current run.
    Run,
}

impl AuctionField {
    /// Every field, in the order a snapshot reads them.
    pub const ALL: [Self; 6] = [
        Self::Item,
        Self::Price,
        Self::Bidder,
        Self::TimeLeft,
        Self::Running,
        Self::Run,
    ];

    /// Returns the store key for this field.
    #[must_use]
    pub const fn key(self) -> &'static str {
        match self {
            Self::Item => "auction:item",
            Self::Price => "auction:price",
            Self::Bidder => "auction:bidder",
            Self::TimeLeft => "auction:time",
            Self::Running => "auction:running",
            Self::Run => "auction:run",
        }
    }

    /// Resolves a store key back to its field.
    #[must_use]
    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|field| field.key() == key)
    }
}

/// Parses an integer field value, defaulting to 0.
#[must_use]
pub fn parse_int(raw: Option<&str>) -> i64 {
    raw.and_then(|v| v.trim().parse().ok()).unwrap_or(0)
}

/// Parses a boolean field value, defaulting to `false`.
#[must_use]
pub fn parse_flag(raw: Option<&str>) -> bool {
    matches!(raw.map(str::trim), Some("true" | "1"))
}

/// Encodes a boolean the way [`parse_flag`] reads it.
#[must_use]
pub fn encode_flag(value: bool) -> String {
    if value { "true" } else { "false" }.to_string()
}

/// Snapshot of the single shared auction record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct AuctionState {
    /// Run this snapshot belongs to; `None` before the first `start`.
    #[schema(value_type = Option<String>)]
    pub run_id: Option<RunId>,
    /// Item under the hammer.
    pub item_name: String,
    /// Highest accepted price (or the opening price).
    pub current_price: i64,
    /// Current high bidder.
    pub high_bidder: String,
    /// Seconds remaining, never negative.
    pub time_left_seconds: i64,
    /// Whether bids are currently accepted.
    pub running: bool,
}

impl AuctionState {
    /// Builds the reset record written by a `start` command.
    #[must_use]
    pub fn opening(run_id: RunId, item_name: &str, opening_price: i64, duration_secs: i64) -> Self {
        Self {
            run_id: Some(run_id),
            item_name: item_name.to_string(),
            current_price: opening_price,
            high_bidder: HOUSE_BIDDER.to_string(),
            time_left_seconds: duration_secs,
            running: true,
        }
    }

    /// Decodes a snapshot from raw store values, applying the unset defaults
    /// (0, empty string, `false`, no run).
    pub fn from_lookup<'a, F>(lookup: F) -> Self
    where
        F: Fn(AuctionField) -> Option<&'a str>,
    {
        Self {
            run_id: lookup(AuctionField::Run).and_then(|v| v.parse().ok()),
            item_name: lookup(AuctionField::Item).unwrap_or_default().to_string(),
            current_price: parse_int(lookup(AuctionField::Price)),
            high_bidder: lookup(AuctionField::Bidder).unwrap_or_default().to_string(),
            time_left_seconds: parse_int(lookup(AuctionField::TimeLeft)).max(0),
            running: parse_flag(lookup(AuctionField::Running)),
        }
    }

    /// Encodes the record as store writes. `Running` comes last so that a
    /// non-atomic backend never exposes a running auction with stale fields.
    #[must_use]
    pub fn to_entries(&self) -> Vec<(AuctionField, String)> {
        vec![
            (
                AuctionField::Run,
                self.run_id.map(|r| r.to_string()).unwrap_or_default(),
            ),
            (AuctionField::Item, self.item_name.clone()),
            (AuctionField::Price, self.current_price.to_string()),
            (AuctionField::Bidder, self.high_bidder.clone()),
            (AuctionField::TimeLeft, self.time_left_seconds.to_string()),
            (AuctionField::Running, encode_flag(self.running)),
        ]
    }
}

/// Timing rules applied to every run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuctionRules {
    /// Countdown length set by `start`.
    pub duration_secs: i64,
    /// An accepted bid with less than this many seconds left extends the clock.
    pub snipe_threshold_secs: i64,
    /// Seconds added by the anti-sniping rule.
    pub snipe_extension_secs: i64,
}

impl Default for AuctionRules {
    fn default() -> Self {
        Self {
            duration_secs: 60,
            snipe_threshold_secs: 10,
            snipe_extension_secs: 10,
        }
    }
}

/// A single bid as submitted by a viewer. Consumed exactly once.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, ToSchema)]
pub struct BidRequest {
    /// Who is bidding.
    #[serde(alias = "username")]
    pub bidder_name: String,
    /// Offered price; must strictly exceed the current price.
    pub amount: i64,
}

impl BidRequest {
    /// Creates a bid request.
    #[must_use]
    pub fn new(bidder_name: impl Into<String>, amount: i64) -> Self {
        Self {
            bidder_name: bidder_name.into(),
            amount,
        }
    }
}

/// A request to (re)start the auction with a new item.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, ToSchema)]
pub struct StartRequest {
    /// Item to put under the hammer.
    pub item_name: String,
    /// Opening price; the first accepted bid must exceed it.
    #[serde(alias = "amount")]
    pub opening_price: i64,
}

/// Why a well-formed bid was turned down.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    /// No auction is running.
    NotRunning,
    /// The amount did not strictly exceed the current price.
    TooLow,
}

impl RejectReason {
    /// Human-readable explanation sent back to the bidder.
    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::NotRunning => "auction is not running",
            Self::TooLow => "bid must be higher than the current price",
        }
    }
}

/// Result of the atomic bid protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BidOutcome {
    /// The bid is now the high bid.
    Accepted,
    /// The bid was rejected without mutating any state.
    Rejected(RejectReason),
}

impl BidOutcome {
    /// Returns `true` if the bid was accepted.
    #[must_use]
    pub const fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted)
    }
}
