//! Shared state store: the single source of truth for the auction record.
//!
//! Every replica reaches the same store. All mutations go through the atomic
//! primitives of [`StateStore`]; no caller performs read-then-write across two
//! round trips when correctness depends on the value in between.
//!
//! Two backends are provided:
//!
//! - [`MemoryStore`]: in-process, for a single replica and for tests.
//! - [`PostgresStore`]: `auction_kv` table plus a server-side bid function,
//!   shared by any number of replicas.

pub mod memory;
pub mod postgres;

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;

pub use memory::MemoryStore;
pub use postgres::PostgresStore;

use crate::domain::auction_state::{parse_flag, parse_int};
use crate::domain::{AuctionField, AuctionRules, AuctionState};
use crate::error::AuctionError;

/// Result of [`StateStore::place_bid`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BidPlacement {
    /// No run was in progress; nothing changed.
    NotRunning,
    /// The amount did not strictly exceed the current price; nothing changed.
    TooLow,
    /// Price and bidder were written.
    Accepted {
        /// Item of the run the bid landed on.
        item_name: String,
        /// Clock after any anti-sniping extension.
        time_left: i64,
    },
}

/// Atomic access to the shared auction record.
///
/// Every method is one indivisible operation against the backend. Failures
/// surface as [`AuctionError::StoreUnavailable`]; callers must not assume the
/// operation took effect.
#[async_trait]
pub trait StateStore: Send + Sync + fmt::Debug {
    /// Returns the raw value of `field`, or `None` if unset.
    async fn get(&self, field: AuctionField) -> Result<Option<String>, AuctionError>;

    /// Unconditionally overwrites `field`.
    async fn set(&self, field: AuctionField, value: String) -> Result<(), AuctionError>;

    /// Writes all `entries` as one atomic batch.
    async fn set_many(&self, entries: &[(AuctionField, String)]) -> Result<(), AuctionError>;

    /// Atomically decrements an integer field (unset reads as 0) and returns
    /// the resulting value.
    async fn decrement_and_get(&self, field: AuctionField) -> Result<i64, AuctionError>;

    /// Accepts a bid only if `new_price` strictly exceeds the integer at
    /// `price` (unset reads as 0), writing both `price` and `bidder` in the
    /// same step. Side-effect free on rejection.
    ///
    /// This is the bare primitive; it does not look at the running flag.
    /// Bids from viewers go through [`StateStore::place_bid`].
    async fn compare_and_set_bid(
        &self,
        price: AuctionField,
        bidder: AuctionField,
        new_price: i64,
        new_bidder: &str,
    ) -> Result<bool, AuctionError>;

    /// Runs the whole bid protocol as one indivisible step: the auction must
    /// be running, `amount` must strictly exceed the current price, and an
    /// accepted bid with less than `rules.snipe_threshold_secs` left adds
    /// `rules.snipe_extension_secs` to the clock. Side-effect free unless
    /// the result is [`BidPlacement::Accepted`].
    async fn place_bid(
        &self,
        amount: i64,
        bidder: &str,
        rules: AuctionRules,
    ) -> Result<BidPlacement, AuctionError>;

    /// Ends the current run if it is running and its clock is at or below
    /// zero. `running` is cleared and the clock set to 0 in the same step,
    /// and the final record is returned. Only one caller per run gets
    /// `Some`; every other caller, and every call while time remains, gets
    /// `None` and changes nothing.
    async fn finish_run(&self) -> Result<Option<AuctionState>, AuctionError>;

    /// Acquires or renews the countdown lease for `owner`. Succeeds if the
    /// lease is free, expired, or already held by `owner`.
    async fn try_acquire_lease(&self, owner: &str, ttl: Duration) -> Result<bool, AuctionError>;

    /// Reads every field in one consistent snapshot.
    async fn snapshot(&self) -> Result<AuctionState, AuctionError>;

    /// Checks that the backend is reachable.
    async fn ping(&self) -> Result<(), AuctionError>;

    /// Reads an integer field, defaulting to 0.
    async fn get_int(&self, field: AuctionField) -> Result<i64, AuctionError> {
        Ok(parse_int(self.get(field).await?.as_deref()))
    }

    /// Reads a string field, defaulting to the empty string.
    async fn get_string(&self, field: AuctionField) -> Result<String, AuctionError> {
        Ok(self.get(field).await?.unwrap_or_default())
    }

    /// Reads a boolean field, defaulting to `false`.
    async fn get_flag(&self, field: AuctionField) -> Result<bool, AuctionError> {
        Ok(parse_flag(self.get(field).await?.as_deref()))
    }
}
