//! Relay from the update channel to this replica's viewers.
//!
//! One relay runs per replica. It forwards every event it receives to the
//! [`ConnectionRegistry`], drops `update`s that arrive after the `end` of
//! their run, and drops duplicate `end`s. When the channel reports missed
//! events, or the subscription dies and is replaced, the relay reads a fresh
//! snapshot from the store and broadcasts that instead of replaying.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use tokio::task::JoinHandle;

use super::registry::ConnectionRegistry;
use crate::channel::{EventStream, UpdateChannel};
use crate::domain::{RunId, StateChangeEvent};
use crate::error::AuctionError;
use crate::store::StateStore;

const REMEMBERED_ENDS: usize = 16;

/// Sticky `end` tracking for recently finished runs.
#[derive(Debug, Default)]
pub struct EndFilter {
    ended: VecDeque<RunId>,
}

impl EndFilter {
    /// Returns `true` if `event` should reach viewers.
    ///
    /// Events without a run id always pass.
    pub fn admit(&mut self, event: &StateChangeEvent) -> bool {
        let Some(run) = event.run_id() else {
            return true;
        };
        if self.ended.contains(&run) {
            return false;
        }
        if matches!(event, StateChangeEvent::End { .. }) {
            if self.ended.len() == REMEMBERED_ENDS {
                self.ended.pop_front();
            }
            self.ended.push_back(run);
        }
        true
    }
}

/// Forwards update-channel events to local viewers.
#[derive(Debug)]
pub struct Relay {
    channel: Arc<dyn UpdateChannel>,
    store: Arc<dyn StateStore>,
    registry: Arc<ConnectionRegistry>,
    backoff: Duration,
    filter: EndFilter,
}

impl Relay {
    /// Creates a relay that waits `backoff` between resubscribe attempts.
    #[must_use]
    pub fn new(
        channel: Arc<dyn UpdateChannel>,
        store: Arc<dyn StateStore>,
        registry: Arc<ConnectionRegistry>,
        backoff: Duration,
    ) -> Self {
        Self {
            channel,
            store,
            registry,
            backoff,
            filter: EndFilter::default(),
        }
    }

    /// Subscribes to the update channel and spawns the relay loop.
    ///
    /// The subscription is open when this returns, so every event published
    /// afterwards reaches the relay.
    ///
    /// # Errors
    ///
    /// Returns [`AuctionError::BusUnavailable`] if the first subscription
    /// cannot be opened.
    pub async fn spawn(self) -> Result<JoinHandle<()>, AuctionError> {
        let stream = self.channel.subscribe().await?;
        Ok(tokio::spawn(self.run(stream)))
    }

    async fn run(mut self, mut stream: EventStream) {
        tracing::info!("relay subscribed to update channel");
        loop {
            while let Some(item) = stream.next().await {
                match item {
                    Ok(event) => self.deliver(&event).await,
                    Err(err) => {
                        tracing::warn!(error = %err, "update channel gap; resynchronising");
                        self.resync().await;
                    }
                }
            }

            tracing::warn!("update channel subscription ended; resubscribing");
            stream = self.resubscribe().await;
            self.resync().await;
        }
    }

    async fn resubscribe(&self) -> EventStream {
        loop {
            tokio::time::sleep(self.backoff).await;
            match self.channel.subscribe().await {
                Ok(stream) => {
                    tracing::info!("relay resubscribed to update channel");
                    return stream;
                }
                Err(err) => tracing::warn!(error = %err, "resubscribe failed"),
            }
        }
    }

    async fn resync(&mut self) {
        match self.store.snapshot().await {
            Ok(state) => self.deliver(&StateChangeEvent::from_snapshot(&state)).await,
            Err(err) => {
                tracing::warn!(error = %err, "resync snapshot failed; waiting for next event");
            }
        }
    }

    async fn deliver(&mut self, event: &StateChangeEvent) {
        if !self.filter.admit(event) {
            tracing::debug!(event_type = event.event_type_str(), "dropping stale event");
            return;
        }
        match self.registry.broadcast(event).await {
            Ok(viewers) => {
                tracing::trace!(event_type = event.event_type_str(), viewers, "relayed");
            }
            Err(err) => tracing::error!(error = %err, "could not encode event for viewers"),
        }
    }
}
