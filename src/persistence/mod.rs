//! Persistence layer: write-behind log of accepted bids.
//!
//! The bid log is a side record, not the auction's source of truth. Writes
//! go through [`BidRecorder`], which detaches them from the caller: a slow
//! or failing database never delays, reverts, or fails an accepted bid.

pub mod memory;
pub mod models;
pub mod postgres;

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::task::JoinHandle;

pub use memory::MemoryBidLog;
pub use models::{BidRecord, StoredBid};
pub use postgres::PostgresBidLog;

use crate::error::AuctionError;

/// Durable storage for accepted bids.
#[async_trait]
pub trait BidSink: Send + Sync + fmt::Debug {
    /// Appends one accepted bid.
    async fn record_bid(&self, bid: &BidRecord) -> Result<(), AuctionError>;

    /// Returns bids newest first.
    async fn recent_bids(&self, limit: u32, offset: u32) -> Result<Vec<StoredBid>, AuctionError>;

    /// Returns the total number of recorded bids.
    async fn count_bids(&self) -> Result<u64, AuctionError>;
}

/// Fire-and-forget front for a [`BidSink`].
#[derive(Debug, Clone, Default)]
pub struct BidRecorder {
    sink: Option<Arc<dyn BidSink>>,
}

impl BidRecorder {
    /// Creates a recorder writing to `sink`.
    #[must_use]
    pub fn new(sink: Arc<dyn BidSink>) -> Self {
        Self { sink: Some(sink) }
    }

    /// Creates a recorder that drops every bid.
    #[must_use]
    pub fn disabled() -> Self {
        Self { sink: None }
    }

    /// Returns `true` if bids are being persisted.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.sink.is_some()
    }

    /// Queues `bid` for writing on a detached task and returns immediately.
    ///
    /// The returned handle is only useful to tests; failures are logged and
    /// dropped inside the task.
    pub fn record(&self, bid: BidRecord) -> Option<JoinHandle<()>> {
        let Some(sink) = &self.sink else {
            tracing::debug!(bidder = %bid.bidder_name, amount = bid.amount, "bid log disabled; skipping");
            return None;
        };
        let sink = Arc::clone(sink);
        Some(tokio::spawn(async move {
            match sink.record_bid(&bid).await {
                Ok(()) => tracing::debug!(
                    item = %bid.item_name,
                    bidder = %bid.bidder_name,
                    amount = bid.amount,
                    "bid persisted"
                ),
                Err(err) => tracing::warn!(
                    error = %err,
                    item = %bid.item_name,
                    bidder = %bid.bidder_name,
                    amount = bid.amount,
                    "failed to persist bid"
                ),
            }
        }))
    }

    /// Returns one page of bid history, newest first, plus the total count.
    /// Empty when persistence is disabled.
    ///
    /// # Errors
    ///
    /// Returns [`AuctionError::PersistenceFailure`] if the sink cannot be read.
    pub async fn history(
        &self,
        limit: u32,
        offset: u32,
    ) -> Result<(Vec<StoredBid>, u64), AuctionError> {
        let Some(sink) = &self.sink else {
            return Ok((Vec::new(), 0));
        };
        let rows = sink.recent_bids(limit, offset).await?;
        let total = sink.count_bids().await?;
        Ok((rows, total))
    }
}
