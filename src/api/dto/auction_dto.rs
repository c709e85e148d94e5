//! Auction DTOs for bids, starts, and bid history.

use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;

use super::common_dto::PaginationMeta;
use crate::domain::{BidOutcome, RejectReason};
use crate::persistence::StoredBid;

/// Response body for `POST /api/v1/auction/bids`.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct BidResponse {
    /// Whether the bid is now the high bid.
    pub accepted: bool,
    /// Why the bid was rejected.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<RejectReason>,
    /// Human-readable rejection message.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl From<BidOutcome> for BidResponse {
    fn from(outcome: BidOutcome) -> Self {
        match outcome {
            BidOutcome::Accepted => Self {
                accepted: true,
                reason: None,
                message: None,
            },
            BidOutcome::Rejected(reason) => Self {
                accepted: false,
                reason: Some(reason),
                message: Some(reason.message().to_string()),
            },
        }
    }
}

/// One accepted bid from the bid log.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct BidDto {
    /// Log row id.
    pub id: i64,
    /// Item the bid was placed on.
    pub item_name: String,
    /// Who placed the bid.
    pub bidder_name: String,
    /// Accepted amount.
    pub amount: i64,
    /// When the bid was recorded.
    pub created_at: DateTime<Utc>,
}

impl From<StoredBid> for BidDto {
    fn from(bid: StoredBid) -> Self {
        Self {
            id: bid.id,
            item_name: bid.item_name,
            bidder_name: bid.bidder_name,
            amount: bid.amount,
            created_at: bid.created_at,
        }
    }
}

/// Response body for `GET /api/v1/auction/bids`.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct BidHistoryResponse {
    /// Bids on this page, newest first.
    pub data: Vec<BidDto>,
    /// Pagination metadata.
    pub pagination: PaginationMeta,
}
