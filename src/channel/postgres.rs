//! PostgreSQL `LISTEN/NOTIFY` update channel.
//!
//! Publishing is `pg_notify(channel, payload)`; every replica holds one
//! [`PgListener`] on the same channel. Payloads are the JSON encoding of
//! [`StateChangeEvent`], well under the 8000-byte notification limit.

use async_trait::async_trait;
use futures_util::StreamExt;
use futures_util::stream;
use sqlx::PgPool;
use sqlx::postgres::PgListener;

use super::{EventStream, UpdateChannel};
use crate::domain::StateChangeEvent;
use crate::error::AuctionError;

fn unavailable(err: sqlx::Error) -> AuctionError {
    AuctionError::BusUnavailable(err.to_string())
}

/// Update channel carried by PostgreSQL notifications.
#[derive(Debug, Clone)]
pub struct PgNotifyChannel {
    pool: PgPool,
    channel: String,
}

impl PgNotifyChannel {
    /// Creates a channel that publishes and listens on `channel`.
    #[must_use]
    pub fn new(pool: PgPool, channel: impl Into<String>) -> Self {
        Self {
            pool,
            channel: channel.into(),
        }
    }
}

#[async_trait]
impl UpdateChannel for PgNotifyChannel {
    async fn publish(&self, event: &StateChangeEvent) -> Result<(), AuctionError> {
        let payload = serde_json::to_string(event)?;
        sqlx::query("SELECT pg_notify($1, $2)")
            .bind(&self.channel)
            .bind(payload)
            .execute(&self.pool)
            .await
            .map_err(unavailable)?;
        Ok(())
    }

    async fn subscribe(&self) -> Result<EventStream, AuctionError> {
        let mut listener = PgListener::connect_with(&self.pool)
            .await
            .map_err(unavailable)?;
        listener
            .listen(&self.channel)
            .await
            .map_err(unavailable)?;

        // `try_recv` yields `None` when the connection dropped; the next call
        // reconnects, so the stream survives and only signals the gap. A hard
        // error ends the stream after reporting it.
        let events = stream::unfold(Some(listener), |state| async move {
            let mut listener = state?;
            match listener.try_recv().await {
                Ok(Some(notification)) => {
                    let event = serde_json::from_str::<StateChangeEvent>(notification.payload())
                        .map_err(AuctionError::from);
                    Some((event, Some(listener)))
                }
                Ok(None) => Some((
                    Err(AuctionError::BusUnavailable(
                        "listener connection lost; notifications may have been missed".into(),
                    )),
                    Some(listener),
                )),
                Err(err) => Some((Err(unavailable(err)), None)),
            }
        });
        Ok(events.boxed())
    }
}
