//! Update channel: the fan-out bus between replicas.
//!
//! Any replica publishes [`StateChangeEvent`]s; every replica subscribes and
//! forwards them to its own viewers. Delivery is at-least-once with no
//! ordering guarantee between publishers, and a fresh subscription only sees
//! events published after it was opened.
//!
//! An `Err` item in an [`EventStream`] means events may have been missed and
//! the consumer should resynchronise from the store; the stream itself keeps
//! going. A stream that ends must be replaced by a new subscription.

pub mod local;
pub mod postgres;

use std::fmt;

use async_trait::async_trait;
use futures_util::stream::BoxStream;

pub use local::LocalChannel;
pub use postgres::PgNotifyChannel;

use crate::domain::StateChangeEvent;
use crate::error::AuctionError;

/// Infinite, non-restartable sequence of events from one subscription.
pub type EventStream = BoxStream<'static, Result<StateChangeEvent, AuctionError>>;

/// Publish/subscribe transport shared by all replicas.
#[async_trait]
pub trait UpdateChannel: Send + Sync + fmt::Debug {
    /// Publishes an event to every current subscriber.
    async fn publish(&self, event: &StateChangeEvent) -> Result<(), AuctionError>;

    /// Opens a new subscription starting at the current point in time.
    async fn subscribe(&self) -> Result<EventStream, AuctionError>;
}
