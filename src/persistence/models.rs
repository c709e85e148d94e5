//! Database models for the bid log.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// An accepted bid queued for durable storage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BidRecord {
    /// Item the bid was placed on.
    pub item_name: String,
    /// Who placed the bid.
    pub bidder_name: String,
    /// Accepted amount.
    pub amount: i64,
    /// When the bid was accepted.
    pub placed_at: DateTime<Utc>,
}

impl BidRecord {
    /// Creates a record stamped with the current time.
    #[must_use]
    pub fn now(item_name: impl Into<String>, bidder_name: impl Into<String>, amount: i64) -> Self {
        Self {
            item_name: item_name.into(),
            bidder_name: bidder_name.into(),
            amount,
            placed_at: Utc::now(),
        }
    }
}

/// A stored row from the `bids` table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredBid {
    /// Auto-increment row ID.
    pub id: i64,
    /// Item the bid was placed on.
    pub item_name: String,
    /// Who placed the bid.
    pub bidder_name: String,
    /// Accepted amount.
    pub amount: i64,
    /// Server-side creation timestamp.
    pub created_at: DateTime<Utc>,
}
