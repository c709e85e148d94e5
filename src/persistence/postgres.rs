//! PostgreSQL implementation of the bid log.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use super::BidSink;
use super::models::{BidRecord, StoredBid};
use crate::error::AuctionError;

fn failure(err: sqlx::Error) -> AuctionError {
    AuctionError::PersistenceFailure(err.to_string())
}

/// PostgreSQL-backed bid log using `sqlx::PgPool`.
#[derive(Debug, Clone)]
pub struct PostgresBidLog {
    pool: PgPool,
}

impl PostgresBidLog {
    /// Creates a new bid log with the given connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl BidSink for PostgresBidLog {
    async fn record_bid(&self, bid: &BidRecord) -> Result<(), AuctionError> {
        sqlx::query(
            "INSERT INTO bids (item_name, bidder_name, amount, created_at) VALUES ($1, $2, $3, $4)",
        )
        .bind(&bid.item_name)
        .bind(&bid.bidder_name)
        .bind(bid.amount)
        .bind(bid.placed_at)
        .execute(&self.pool)
        .await
        .map_err(failure)?;
        Ok(())
    }

    async fn recent_bids(&self, limit: u32, offset: u32) -> Result<Vec<StoredBid>, AuctionError> {
        let rows = sqlx::query_as::<_, (i64, String, String, i64, DateTime<Utc>)>(
            "SELECT id, item_name, bidder_name, amount, created_at FROM bids \
             ORDER BY created_at DESC, id DESC LIMIT $1 OFFSET $2",
        )
        .bind(i64::from(limit))
        .bind(i64::from(offset))
        .fetch_all(&self.pool)
        .await
        .map_err(failure)?;

        Ok(rows
            .into_iter()
            .map(
                |(id, item_name, bidder_name, amount, created_at)| StoredBid {
                    id,
                    item_name,
                    bidder_name,
                    amount,
                    created_at,
                },
            )
            .collect())
    }

    async fn count_bids(&self) -> Result<u64, AuctionError> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM bids")
            .fetch_one(&self.pool)
            .await
            .map_err(failure)?;
        Ok(u64::try_from(count).unwrap_or(0))
    }
}
