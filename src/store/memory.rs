//! In-process state store.
//!
//! A single [`tokio::sync::Mutex`] guards every field, so each trait method
//! is trivially atomic. Clones share the same record, which lets several
//! in-process replicas (or tests) contend on one store.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio::time::Instant;

use super::{BidPlacement, StateStore};
use crate::domain::auction_state::{encode_flag, parse_flag, parse_int};
use crate::domain::{AuctionField, AuctionRules, AuctionState};
use crate::error::AuctionError;

#[derive(Debug)]
struct Lease {
    owner: String,
    expires_at: Instant,
}

#[derive(Debug, Default)]
struct Inner {
    values: HashMap<AuctionField, String>,
    lease: Option<Lease>,
}

impl Inner {
    fn int(&self, field: AuctionField) -> i64 {
        parse_int(self.values.get(&field).map(String::as_str))
    }

    fn flag(&self, field: AuctionField) -> bool {
        parse_flag(self.values.get(&field).map(String::as_str))
    }

    fn state(&self) -> AuctionState {
        AuctionState::from_lookup(|field| self.values.get(&field).map(String::as_str))
    }
}

/// Shared-nothing-across-processes store backed by a mutex-guarded map.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StateStore for MemoryStore {
    async fn get(&self, field: AuctionField) -> Result<Option<String>, AuctionError> {
        Ok(self.inner.lock().await.values.get(&field).cloned())
    }

    async fn set(&self, field: AuctionField, value: String) -> Result<(), AuctionError> {
        self.inner.lock().await.values.insert(field, value);
        Ok(())
    }

    async fn set_many(&self, entries: &[(AuctionField, String)]) -> Result<(), AuctionError> {
        let mut inner = self.inner.lock().await;
        for (field, value) in entries {
            inner.values.insert(*field, value.clone());
        }
        Ok(())
    }

    async fn decrement_and_get(&self, field: AuctionField) -> Result<i64, AuctionError> {
        let mut inner = self.inner.lock().await;
        let next = inner.int(field).saturating_sub(1);
        inner.values.insert(field, next.to_string());
        Ok(next)
    }

    async fn compare_and_set_bid(
        &self,
        price: AuctionField,
        bidder: AuctionField,
        new_price: i64,
        new_bidder: &str,
    ) -> Result<bool, AuctionError> {
        let mut inner = self.inner.lock().await;
        if new_price <= inner.int(price) {
            return Ok(false);
        }
        inner.values.insert(price, new_price.to_string());
        inner.values.insert(bidder, new_bidder.to_string());
        Ok(true)
    }

    async fn place_bid(
        &self,
        amount: i64,
        bidder: &str,
        rules: AuctionRules,
    ) -> Result<BidPlacement, AuctionError> {
        let mut inner = self.inner.lock().await;
        if !inner.flag(AuctionField::Running) {
            return Ok(BidPlacement::NotRunning);
        }
        if amount <= inner.int(AuctionField::Price) {
            return Ok(BidPlacement::TooLow);
        }
        inner.values.insert(AuctionField::Price, amount.to_string());
        inner.values.insert(AuctionField::Bidder, bidder.to_string());

        let mut time_left = inner.int(AuctionField::TimeLeft);
        if time_left < rules.snipe_threshold_secs {
            time_left = time_left.saturating_add(rules.snipe_extension_secs);
            inner.values.insert(AuctionField::TimeLeft, time_left.to_string());
        }
        Ok(BidPlacement::Accepted {
            item_name: inner.values.get(&AuctionField::Item).cloned().unwrap_or_default(),
            time_left,
        })
    }

    async fn finish_run(&self) -> Result<Option<AuctionState>, AuctionError> {
        let mut inner = self.inner.lock().await;
        if !inner.flag(AuctionField::Running) || inner.int(AuctionField::TimeLeft) > 0 {
            return Ok(None);
        }
        inner.values.insert(AuctionField::Running, encode_flag(false));
        inner.values.insert(AuctionField::TimeLeft, "0".to_string());
        Ok(Some(inner.state()))
    }

    async fn try_acquire_lease(&self, owner: &str, ttl: Duration) -> Result<bool, AuctionError> {
        let mut inner = self.inner.lock().await;
        let now = Instant::now();
        let available = inner
            .lease
            .as_ref()
            .is_none_or(|lease| lease.owner == owner || lease.expires_at <= now);
        if available {
            inner.lease = Some(Lease {
                owner: owner.to_string(),
                expires_at: now + ttl,
            });
        }
        Ok(available)
    }

    async fn snapshot(&self) -> Result<AuctionState, AuctionError> {
        Ok(self.inner.lock().await.state())
    }

    async fn ping(&self) -> Result<(), AuctionError> {
        Ok(())
    }
}
