//! Countdown: the one-second tick that drives every run to its end.
//!
//! Every replica runs a [`Countdown`]. With the lease enabled only the
//! current lease holder decrements the shared clock, so adding replicas
//! does not make the auction run faster. If the holder dies the lease
//! expires and another replica takes over within one TTL.

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use super::AuctionService;
use crate::domain::{AuctionField, StateChangeEvent};
use crate::error::AuctionError;

/// What a single tick did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Another replica holds the countdown lease.
    Standby,
    /// No auction is running.
    Idle,
    /// The clock was decremented; carries the seconds remaining.
    Ticked(i64),
    /// This tick ended the auction and published `end`.
    Ended,
}

#[derive(Debug, Clone)]
struct Lease {
    owner: String,
    ttl: Duration,
}

/// Periodic driver of the shared countdown.
#[derive(Debug, Clone)]
pub struct Countdown {
    service: AuctionService,
    interval: Duration,
    lease: Option<Lease>,
}

impl Countdown {
    /// Creates a countdown ticking every `interval` with no lease, so every
    /// instance decrements the clock.
    #[must_use]
    pub fn new(service: AuctionService, interval: Duration) -> Self {
        Self {
            service,
            interval,
            lease: None,
        }
    }

    /// Restricts ticking to the holder of the countdown lease.
    #[must_use]
    pub fn with_lease(mut self, owner: impl Into<String>, ttl: Duration) -> Self {
        self.lease = Some(Lease {
            owner: owner.into(),
            ttl,
        });
        self
    }

    /// Performs one tick.
    ///
    /// Decrements the clock while running and publishes the new time. When
    /// the clock reaches zero the run is finished in one store operation
    /// that clears the running flag, zeroes the clock, and returns the final
    /// record. Only the caller that finished the run publishes `end`, so a
    /// run ends exactly once even with several tickers, and nothing is
    /// written to the record afterwards.
    ///
    /// # Errors
    ///
    /// Returns [`AuctionError::StoreUnavailable`] if the store could not be
    /// read or written. A failed finish changes nothing; the next tick
    /// retries it.
    pub async fn tick(&self) -> Result<TickOutcome, AuctionError> {
        let store = self.service.store();

        if let Some(lease) = &self.lease
            && !store.try_acquire_lease(&lease.owner, lease.ttl).await?
        {
            return Ok(TickOutcome::Standby);
        }

        if !store.get_flag(AuctionField::Running).await? {
            return Ok(TickOutcome::Idle);
        }

        let remaining = store.decrement_and_get(AuctionField::TimeLeft).await?;
        if remaining > 0 {
            let mut state = store.snapshot().await?;
            // A bid may have extended the clock since the decrement.
            state.time_left_seconds = state.time_left_seconds.max(remaining);
            self.service
                .announce(&StateChangeEvent::update(&state, None))
                .await;
            return Ok(TickOutcome::Ticked(remaining));
        }

        // Declines if a late bid extended the clock since the decrement.
        let Some(state) = store.finish_run().await? else {
            return Ok(TickOutcome::Idle);
        };
        tracing::info!(
            run = ?state.run_id,
            item = %state.item_name,
            final_price = state.current_price,
            winner = %state.high_bidder,
            "auction ended"
        );
        self.service.announce(&StateChangeEvent::end(&state)).await;
        Ok(TickOutcome::Ended)
    }

    /// Ticks forever at the configured interval. The first decrement
    /// happens one full interval after the call.
    pub async fn run(self) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker.tick().await;

        loop {
            ticker.tick().await;
            match self.tick().await {
                Ok(TickOutcome::Ticked(remaining)) => {
                    tracing::trace!(remaining, "countdown tick");
                }
                Ok(_) => {}
                Err(err) => tracing::warn!(error = %err, "countdown tick failed"),
            }
        }
    }

    /// Spawns [`Countdown::run`] on the runtime.
    #[must_use]
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};

    use async_trait::async_trait;
    use futures_util::StreamExt;
    use tokio_test::{assert_err, assert_ok};

    use super::*;
    use crate::channel::{EventStream, LocalChannel, UpdateChannel};
    use crate::domain::{AuctionRules, AuctionState, BidRequest, RunId, StateChangeEvent};
    use crate::persistence::BidRecorder;
    use crate::store::{BidPlacement, MemoryStore, StateStore};

    fn make_service(store: &MemoryStore, channel: &LocalChannel) -> AuctionService {
        AuctionService::new(
            Arc::new(store.clone()),
            Arc::new(channel.clone()),
            BidRecorder::disabled(),
            AuctionRules::default(),
        )
    }

    async fn tick_times(countdown: &Countdown, n: usize) {
        for _ in 0..n {
            assert_ok!(countdown.tick().await);
        }
    }

    async fn next_end(events: &mut EventStream) -> StateChangeEvent {
        while let Some(item) = events.next().await {
            let event = assert_ok!(item);
            if event.event_type_str() == "end" {
                return event;
            }
        }
        panic!("stream closed before end");
    }

    #[tokio::test]
    async fn idle_without_a_running_auction() {
        let store = MemoryStore::new();
        let channel = LocalChannel::new(16);
        let countdown = Countdown::new(make_service(&store, &channel), Duration::from_secs(1));
        assert_eq!(assert_ok!(countdown.tick().await), TickOutcome::Idle);
        assert_eq!(assert_ok!(store.get_int(AuctionField::TimeLeft).await), 0);
    }

    #[tokio::test]
    async fn full_run_without_bids_sells_to_the_house() {
        let store = MemoryStore::new();
        let channel = LocalChannel::new(256);
        let service = make_service(&store, &channel);
        let countdown = Countdown::new(service.clone(), Duration::from_secs(1));
        assert_ok!(service.start_auction("Lamp", 25).await);
        let mut events = assert_ok!(channel.subscribe().await);

        tick_times(&countdown, 59).await;
        assert_eq!(assert_ok!(store.get_int(AuctionField::TimeLeft).await), 1);
        assert_eq!(assert_ok!(countdown.tick().await), TickOutcome::Ended);

        let StateChangeEvent::End {
            final_price,
            winner,
            message,
            ..
        } = next_end(&mut events).await
        else {
            panic!("expected end");
        };
        assert_eq!(final_price, 25);
        assert_eq!(winner, "House");
        assert_eq!(message, "SOLD!");

        let state = assert_ok!(store.snapshot().await);
        assert!(!state.running);
        assert_eq!(state.time_left_seconds, 0);
        assert_eq!(assert_ok!(countdown.tick().await), TickOutcome::Idle);
    }

    #[tokio::test]
    async fn late_bid_extends_and_wins() {
        let store = MemoryStore::new();
        let channel = LocalChannel::new(256);
        let service = make_service(&store, &channel);
        let countdown = Countdown::new(service.clone(), Duration::from_secs(1));
        assert_ok!(service.start_auction("GPU", 500).await);

        tick_times(&countdown, 55).await;
        assert_eq!(assert_ok!(store.get_int(AuctionField::TimeLeft).await), 5);

        let outcome = assert_ok!(service.submit_bid(BidRequest::new("alice", 600)).await);
        assert!(outcome.is_accepted());
        assert_eq!(assert_ok!(store.get_int(AuctionField::TimeLeft).await), 15);

        let mut events = assert_ok!(channel.subscribe().await);
        tick_times(&countdown, 14).await;
        assert_eq!(assert_ok!(countdown.tick().await), TickOutcome::Ended);

        let StateChangeEvent::End {
            final_price, winner, ..
        } = next_end(&mut events).await
        else {
            panic!("expected end");
        };
        assert_eq!(final_price, 600);
        assert_eq!(winner, "alice");
    }

    #[tokio::test]
    async fn two_tickers_end_a_run_once() {
        let store = MemoryStore::new();
        let channel = LocalChannel::new(256);
        let service = make_service(&store, &channel);
        let a = Countdown::new(service.clone(), Duration::from_secs(1));
        let b = Countdown::new(make_service(&store, &channel), Duration::from_secs(1));
        assert_ok!(service.start_auction("Lamp", 1).await);
        assert_ok!(store.set(AuctionField::TimeLeft, "1".into()).await);

        let (ra, rb) = tokio::join!(a.tick(), b.tick());
        let ended = [assert_ok!(ra), assert_ok!(rb)]
            .iter()
            .filter(|o| **o == TickOutcome::Ended)
            .count();
        assert_eq!(ended, 1);
    }

    #[tokio::test]
    async fn only_the_lease_holder_ticks() {
        let store = MemoryStore::new();
        let channel = LocalChannel::new(256);
        let service = make_service(&store, &channel);
        let ttl = Duration::from_secs(3);
        let holder = Countdown::new(service.clone(), Duration::from_secs(1)).with_lease("r1", ttl);
        let other = Countdown::new(service.clone(), Duration::from_secs(1)).with_lease("r2", ttl);
        assert_ok!(service.start_auction("Lamp", 1).await);

        assert_eq!(assert_ok!(holder.tick().await), TickOutcome::Ticked(59));
        assert_eq!(assert_ok!(other.tick().await), TickOutcome::Standby);
        assert_eq!(assert_ok!(holder.tick().await), TickOutcome::Ticked(58));
    }

    #[tokio::test(start_paused = true)]
    async fn run_ticks_once_per_interval() {
        let store = MemoryStore::new();
        let channel = LocalChannel::new(256);
        let service = make_service(&store, &channel);
        assert_ok!(service.start_auction("Lamp", 1).await);

        let handle = Countdown::new(service, Duration::from_secs(1)).spawn();
        tokio::time::sleep(Duration::from_millis(3500)).await;
        handle.abort();

        assert_eq!(assert_ok!(store.get_int(AuctionField::TimeLeft).await), 57);
    }

    #[tokio::test]
    async fn updates_carry_the_decremented_time() {
        let store = MemoryStore::new();
        let channel = LocalChannel::new(16);
        let service = make_service(&store, &channel);
        let countdown = Countdown::new(service.clone(), Duration::from_secs(1));
        assert_ok!(service.start_auction("Lamp", 1).await);
        let mut events = assert_ok!(channel.subscribe().await);

        assert_eq!(assert_ok!(countdown.tick().await), TickOutcome::Ticked(59));
        let Some(Ok(StateChangeEvent::Update { time_left, .. })) = events.next().await else {
            panic!("expected update");
        };
        assert_eq!(time_left, 59);
    }

    /// Opens a new run the moment an `end` goes out, as a `start` from
    /// another replica would.
    #[derive(Debug)]
    struct RestartOnEnd {
        inner: LocalChannel,
        store: MemoryStore,
    }

    #[async_trait]
    impl UpdateChannel for RestartOnEnd {
        async fn publish(&self, event: &StateChangeEvent) -> Result<(), AuctionError> {
            if event.event_type_str() == "end" {
                let next = AuctionState::opening(RunId::new(), "Lamp", 20, 60);
                self.store.set_many(&next.to_entries()).await?;
            }
            self.inner.publish(event).await
        }

        async fn subscribe(&self) -> Result<EventStream, AuctionError> {
            self.inner.subscribe().await
        }
    }

    #[tokio::test]
    async fn ending_a_run_leaves_the_next_run_alone() {
        let store = MemoryStore::new();
        let service = AuctionService::new(
            Arc::new(store.clone()),
            Arc::new(RestartOnEnd {
                inner: LocalChannel::new(16),
                store: store.clone(),
            }),
            BidRecorder::disabled(),
            AuctionRules::default(),
        );
        let countdown = Countdown::new(service.clone(), Duration::from_secs(1));
        assert_ok!(service.start_auction("GPU", 500).await);
        assert_ok!(store.set(AuctionField::TimeLeft, "1".into()).await);

        assert_eq!(assert_ok!(countdown.tick().await), TickOutcome::Ended);
        let state = assert_ok!(store.snapshot().await);
        assert_eq!(state.item_name, "Lamp");
        assert!(state.running);
        assert_eq!(state.time_left_seconds, 60);

        assert_eq!(assert_ok!(countdown.tick().await), TickOutcome::Ticked(59));
    }

    /// A [`MemoryStore`] whose first `finish_run` fails before touching
    /// anything.
    #[derive(Debug)]
    struct FlakyFinish {
        inner: MemoryStore,
        failed: AtomicBool,
    }

    #[async_trait]
    impl StateStore for FlakyFinish {
        async fn get(&self, field: AuctionField) -> Result<Option<String>, AuctionError> {
            self.inner.get(field).await
        }
        async fn set(&self, field: AuctionField, value: String) -> Result<(), AuctionError> {
            self.inner.set(field, value).await
        }
        async fn set_many(&self, entries: &[(AuctionField, String)]) -> Result<(), AuctionError> {
            self.inner.set_many(entries).await
        }
        async fn decrement_and_get(&self, field: AuctionField) -> Result<i64, AuctionError> {
            self.inner.decrement_and_get(field).await
        }
        async fn compare_and_set_bid(
            &self,
            price: AuctionField,
            bidder: AuctionField,
            new_price: i64,
            new_bidder: &str,
        ) -> Result<bool, AuctionError> {
            self.inner
                .compare_and_set_bid(price, bidder, new_price, new_bidder)
                .await
        }
        async fn place_bid(
            &self,
            amount: i64,
            bidder: &str,
            rules: AuctionRules,
        ) -> Result<BidPlacement, AuctionError> {
            self.inner.place_bid(amount, bidder, rules).await
        }
        async fn finish_run(&self) -> Result<Option<AuctionState>, AuctionError> {
            if !self.failed.swap(true, Ordering::SeqCst) {
                return Err(AuctionError::StoreUnavailable("connection reset".into()));
            }
            self.inner.finish_run().await
        }
        async fn try_acquire_lease(&self, owner: &str, ttl: Duration) -> Result<bool, AuctionError> {
            self.inner.try_acquire_lease(owner, ttl).await
        }
        async fn snapshot(&self) -> Result<AuctionState, AuctionError> {
            self.inner.snapshot().await
        }
        async fn ping(&self) -> Result<(), AuctionError> {
            self.inner.ping().await
        }
    }

    #[tokio::test]
    async fn failed_finish_is_retried_on_the_next_tick() {
        let store = MemoryStore::new();
        let channel = LocalChannel::new(16);
        let service = AuctionService::new(
            Arc::new(FlakyFinish {
                inner: store.clone(),
                failed: AtomicBool::new(false),
            }),
            Arc::new(channel.clone()),
            BidRecorder::disabled(),
            AuctionRules::default(),
        );
        let countdown = Countdown::new(service.clone(), Duration::from_secs(1));
        assert_ok!(service.start_auction("GPU", 500).await);
        assert_ok!(store.set(AuctionField::TimeLeft, "1".into()).await);
        let mut events = assert_ok!(channel.subscribe().await);

        let err = assert_err!(countdown.tick().await);
        assert!(err.is_transient());
        assert!(assert_ok!(store.get_flag(AuctionField::Running).await));

        assert_eq!(assert_ok!(countdown.tick().await), TickOutcome::Ended);
        let StateChangeEvent::End { final_price, .. } = next_end(&mut events).await else {
            panic!("expected end");
        };
        assert_eq!(final_price, 500);
        assert_eq!(assert_ok!(store.get_int(AuctionField::TimeLeft).await), 0);
    }

    #[tokio::test]
    async fn a_late_bid_keeps_the_run_alive() {
        let store = MemoryStore::new();
        let channel = LocalChannel::new(16);
        let service = make_service(&store, &channel);
        assert_ok!(service.start_auction("GPU", 500).await);
        assert_ok!(store.set(AuctionField::TimeLeft, "0".into()).await);

        // Bid lands after the decrement reached zero but before the finish.
        assert_ok!(service.submit_bid(BidRequest::new("alice", 600)).await);
        assert_eq!(assert_ok!(store.finish_run().await), None);
        assert_eq!(assert_ok!(store.get_int(AuctionField::TimeLeft).await), 10);
        assert!(assert_ok!(store.get_flag(AuctionField::Running).await));
    }
}
