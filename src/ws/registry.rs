//! Per-replica registry of connected viewers.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use axum::extract::ws::Message;
use tokio::sync::{Mutex, mpsc};
use tokio::sync::mpsc::error::TrySendError;

use crate::domain::StateChangeEvent;
use crate::error::AuctionError;

/// Replica-local identifier of one viewer connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Outbound queues of every viewer connected to this replica.
///
/// Holds only the sending half of each connection's bounded queue; the
/// connection's writer task owns the socket. Removing an entry drops the
/// last sender, which ends the writer and closes that socket. A queue that
/// is full or closed counts as a write failure and only that entry is
/// removed.
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    next_id: AtomicU64,
    connections: Mutex<HashMap<ConnectionId, mpsc::Sender<Message>>>,
}

impl ConnectionRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a connection's outbound queue and returns its new id.
    pub async fn register(&self, sender: mpsc::Sender<Message>) -> ConnectionId {
        let id = ConnectionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.connections.lock().await.insert(id, sender);
        tracing::debug!(connection = %id, "viewer registered");
        id
    }

    /// Removes a connection. Returns `false` if it was already gone.
    pub async fn unregister(&self, id: ConnectionId) -> bool {
        let removed = self.connections.lock().await.remove(&id).is_some();
        if removed {
            tracing::debug!(connection = %id, "viewer unregistered");
        }
        removed
    }

    /// Number of viewers currently registered.
    pub async fn len(&self) -> usize {
        self.connections.lock().await.len()
    }

    /// Returns `true` if no viewer is registered.
    pub async fn is_empty(&self) -> bool {
        self.connections.lock().await.is_empty()
    }

    /// Queues `event` for every registered viewer and returns how many
    /// accepted it. The event is serialized once.
    ///
    /// # Errors
    ///
    /// Returns [`AuctionError::Serialization`] if the event cannot be
    /// encoded; nothing is sent in that case.
    pub async fn broadcast(&self, event: &StateChangeEvent) -> Result<usize, AuctionError> {
        let message = encode(event)?;
        let mut connections = self.connections.lock().await;

        let mut failed = Vec::new();
        for (id, sender) in connections.iter() {
            if let Err(err) = sender.try_send(message.clone()) {
                failed.push((*id, err));
            }
        }
        for (id, err) in &failed {
            connections.remove(id);
            log_dropped(*id, err);
        }
        Ok(connections.len())
    }

    /// Queues `event` for a single viewer. Returns `false` if the viewer is
    /// gone or its queue could not take the message, in which case it is
    /// removed.
    ///
    /// # Errors
    ///
    /// Returns [`AuctionError::Serialization`] if the event cannot be encoded.
    pub async fn send_to(
        &self,
        id: ConnectionId,
        event: &StateChangeEvent,
    ) -> Result<bool, AuctionError> {
        let message = encode(event)?;
        let mut connections = self.connections.lock().await;
        let Some(sender) = connections.get(&id) else {
            return Ok(false);
        };
        match sender.try_send(message) {
            Ok(()) => Ok(true),
            Err(err) => {
                connections.remove(&id);
                log_dropped(id, &err);
                Ok(false)
            }
        }
    }
}

fn encode(event: &StateChangeEvent) -> Result<Message, AuctionError> {
    Ok(Message::text(serde_json::to_string(event)?))
}

fn log_dropped<T>(id: ConnectionId, err: &TrySendError<T>) {
    let reason = match err {
        TrySendError::Full(_) => "outbound queue full",
        TrySendError::Closed(_) => "outbound queue closed",
    };
    let err = AuctionError::ConnectionIo(reason.to_string());
    tracing::warn!(connection = %id, error = %err, "dropping viewer");
}
