//! In-process bid log.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::BidSink;
use super::models::{BidRecord, StoredBid};
use crate::error::AuctionError;

/// Bid log kept in memory, for single-process deployments and tests.
#[derive(Debug, Clone, Default)]
pub struct MemoryBidLog {
    rows: Arc<RwLock<Vec<StoredBid>>>,
}

impl MemoryBidLog {
    /// Creates an empty log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl BidSink for MemoryBidLog {
    async fn record_bid(&self, bid: &BidRecord) -> Result<(), AuctionError> {
        let mut rows = self.rows.write().await;
        let id = i64::try_from(rows.len()).unwrap_or(i64::MAX).saturating_add(1);
        rows.push(StoredBid {
            id,
            item_name: bid.item_name.clone(),
            bidder_name: bid.bidder_name.clone(),
            amount: bid.amount,
            created_at: bid.placed_at,
        });
        Ok(())
    }

    async fn recent_bids(&self, limit: u32, offset: u32) -> Result<Vec<StoredBid>, AuctionError> {
        let rows = self.rows.read().await;
        Ok(rows
            .iter()
            .rev()
            .skip(offset as usize)
            .take(limit as usize)
            .cloned()
            .collect())
    }

    async fn count_bids(&self) -> Result<u64, AuctionError> {
        Ok(self.rows.read().await.len() as u64)
    }
}
