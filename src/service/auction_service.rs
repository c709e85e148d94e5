//! Auction service: starts runs and executes the atomic bid protocol.

use std::sync::Arc;

use crate::channel::UpdateChannel;
use crate::domain::{
    AuctionRules, AuctionState, BidOutcome, BidRequest, MAX_NAME_CHARS, RejectReason, RunId,
    StateChangeEvent,
};
use crate::error::AuctionError;
use crate::persistence::{BidRecord, BidRecorder};
use crate::store::{BidPlacement, StateStore};

/// Orchestration layer for auction commands.
///
/// Stateless coordinator: the auction record lives in the [`StateStore`],
/// events go out on the [`UpdateChannel`], and accepted bids are handed to
/// the [`BidRecorder`]. Every replica builds its own `AuctionService` over the
/// same shared backends.
#[derive(Debug, Clone)]
pub struct AuctionService {
    store: Arc<dyn StateStore>,
    channel: Arc<dyn UpdateChannel>,
    recorder: BidRecorder,
    rules: AuctionRules,
}

impl AuctionService {
    /// Creates a new `AuctionService`.
    #[must_use]
    pub fn new(
        store: Arc<dyn StateStore>,
        channel: Arc<dyn UpdateChannel>,
        recorder: BidRecorder,
        rules: AuctionRules,
    ) -> Self {
        Self {
            store,
            channel,
            recorder,
            rules,
        }
    }

    /// Returns a reference to the shared store.
    #[must_use]
    pub fn store(&self) -> &Arc<dyn StateStore> {
        &self.store
    }

    /// Returns a reference to the update channel.
    #[must_use]
    pub fn channel(&self) -> &Arc<dyn UpdateChannel> {
        &self.channel
    }

    /// Returns a reference to the bid recorder.
    #[must_use]
    pub fn recorder(&self) -> &BidRecorder {
        &self.recorder
    }

    /// Returns the timing rules applied to new runs and bids.
    #[must_use]
    pub const fn rules(&self) -> AuctionRules {
        self.rules
    }

    /// Reads the current auction record from the store.
    ///
    /// # Errors
    ///
    /// Returns [`AuctionError::StoreUnavailable`] if the store cannot be read.
    pub async fn snapshot(&self) -> Result<AuctionState, AuctionError> {
        self.store.snapshot().await
    }

    /// Resets the auction to a new run and publishes the opening snapshot.
    ///
    /// Always allowed, including over a running auction.
    ///
    /// # Errors
    ///
    /// Returns [`AuctionError::InvalidRequest`] for a blank or oversized item
    /// name or a negative opening price, and [`AuctionError::StoreUnavailable`] if the
    /// reset could not be written.
    pub async fn start_auction(
        &self,
        item_name: &str,
        opening_price: i64,
    ) -> Result<AuctionState, AuctionError> {
        let item_name = item_name.trim();
        if item_name.is_empty() {
            return Err(AuctionError::InvalidRequest(
                "item name must not be empty".into(),
            ));
        }
        if item_name.chars().count() > MAX_NAME_CHARS {
            return Err(AuctionError::InvalidRequest(format!(
                "item name must be at most {MAX_NAME_CHARS} characters"
            )));
        }
        if opening_price < 0 {
            return Err(AuctionError::InvalidRequest(
                "opening price must not be negative".into(),
            ));
        }

        let state = AuctionState::opening(
            RunId::new(),
            item_name,
            opening_price,
            self.rules.duration_secs,
        );
        self.store.set_many(&state.to_entries()).await?;

        tracing::info!(
            run = ?state.run_id,
            item = item_name,
            opening_price,
            "auction started"
        );
        self.announce(&StateChangeEvent::update(&state, None)).await;
        Ok(state)
    }

    /// Executes the atomic bid protocol.
    ///
    /// A bid is accepted only while the auction is running and only if its
    /// amount strictly exceeds the current price. The running check, the
    /// comparison, both writes, and the anti-sniping extension are a single
    /// store operation, so a bid can never land on a run that has already
    /// ended. On acceptance the bid is queued for the bid log and an
    /// `update` is published. Rejections mutate nothing and publish nothing.
    ///
    /// Once the store has accepted the bid, later failures (snapshot,
    /// publish, persistence) are logged and never reported as a failed bid.
    ///
    /// # Errors
    ///
    /// Returns [`AuctionError::InvalidBid`] for a blank or oversized bidder
    /// name and [`AuctionError::StoreUnavailable`] if the bid could not be
    /// placed.
    pub async fn submit_bid(&self, bid: BidRequest) -> Result<BidOutcome, AuctionError> {
        let bidder = bid.bidder_name.trim();
        if bidder.is_empty() {
            return Err(AuctionError::InvalidBid(
                "bidder name must not be empty".into(),
            ));
        }
        if bidder.chars().count() > MAX_NAME_CHARS {
            return Err(AuctionError::InvalidBid(format!(
                "bidder name must be at most {MAX_NAME_CHARS} characters"
            )));
        }

        let item_name = match self.store.place_bid(bid.amount, bidder, self.rules).await? {
            BidPlacement::NotRunning => {
                tracing::debug!(bidder, amount = bid.amount, "bid rejected: auction not running");
                return Ok(BidOutcome::Rejected(RejectReason::NotRunning));
            }
            BidPlacement::TooLow => {
                tracing::debug!(bidder, amount = bid.amount, "bid rejected: not above current price");
                return Ok(BidOutcome::Rejected(RejectReason::TooLow));
            }
            BidPlacement::Accepted {
                item_name,
                time_left,
            } => {
                tracing::info!(bidder, amount = bid.amount, time_left, "bid accepted");
                item_name
            }
        };

        self.recorder
            .record(BidRecord::now(item_name, bidder, bid.amount));

        match self.store.snapshot().await {
            Ok(state) => {
                let still_high =
                    state.high_bidder == bidder && state.current_price == bid.amount;
                let message = still_high.then(|| format!("{bidder} bid {}", bid.amount));
                self.announce(&StateChangeEvent::update(&state, message))
                    .await;
            }
            // Viewers converge on the next countdown tick.
            Err(err) => {
                tracing::warn!(error = %err, bidder, "accepted bid not announced: snapshot failed");
            }
        }

        Ok(BidOutcome::Accepted)
    }

    /// Publishes `event`, logging instead of failing when the channel is down.
    pub(crate) async fn announce(&self, event: &StateChangeEvent) {
        if let Err(err) = self.channel.publish(event).await {
            tracing::warn!(
                error = %err,
                event_type = event.event_type_str(),
                "failed to publish state change"
            );
        }
    }
}
