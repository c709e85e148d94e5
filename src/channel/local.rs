//! In-process update channel.
//!
//! [`LocalChannel`] wraps a [`tokio::sync::broadcast`] channel. It connects
//! replicas living in the same process (or a single replica to itself).

use async_trait::async_trait;
use futures_util::StreamExt;
use futures_util::stream;
use tokio::sync::broadcast;

use super::{EventStream, UpdateChannel};
use crate::domain::StateChangeEvent;
use crate::error::AuctionError;

/// Broadcast bus for [`StateChangeEvent`]s.
///
/// Backed by a `tokio::broadcast` channel with a configurable capacity. When
/// the ring buffer is full, the oldest events are dropped for lagging
/// receivers, which then see a [`AuctionError::BusUnavailable`] item.
#[derive(Debug, Clone)]
pub struct LocalChannel {
    sender: broadcast::Sender<StateChangeEvent>,
}

impl LocalChannel {
    /// Creates a new `LocalChannel` with the given capacity.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Returns the current number of active subscriptions.
    #[must_use]
    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

#[async_trait]
impl UpdateChannel for LocalChannel {
    async fn publish(&self, event: &StateChangeEvent) -> Result<(), AuctionError> {
        // No receivers is not a failure: nobody is listening yet.
        let _ = self.sender.send(event.clone());
        Ok(())
    }

    async fn subscribe(&self) -> Result<EventStream, AuctionError> {
        let receiver = self.sender.subscribe();
        let events = stream::unfold(receiver, |mut rx| async move {
            match rx.recv().await {
                Ok(event) => Some((Ok(event), rx)),
                Err(broadcast::error::RecvError::Lagged(n)) => Some((
                    Err(AuctionError::BusUnavailable(format!(
                        "subscriber lagged behind by {n} events"
                    ))),
                    rx,
                )),
                Err(broadcast::error::RecvError::Closed) => None,
            }
        });
        Ok(events.boxed())
    }
}
