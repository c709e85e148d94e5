//! State-change events published on the update channel.
//!
//! A [`StateChangeEvent`] is immutable once published. Its JSON form is both
//! the update-channel payload and the outbound viewer message, so a replica
//! forwards what it receives without re-encoding the domain meaning.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{AuctionState, RunId, SOLD_MESSAGE};

/// Event fanned out to every replica and from there to every viewer.
///
/// `update` events are last-write-wins snapshots; `end` is the final event of
/// a run and overrides any stale `update` of the same run received after it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StateChangeEvent {
    /// Current price and countdown of a run.
    Update {
        /// Run the snapshot belongs to.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        run_id: Option<RunId>,
        /// Item under the hammer.
        item_name: String,
        /// Current high price.
        price: i64,
        /// Current high bidder.
        bidder: String,
        /// Seconds remaining.
        time_left: i64,
        /// Optional status line for viewers.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message: Option<String>,
        /// When the event was produced.
        timestamp: DateTime<Utc>,
    },

    /// A failure reported to a single viewer. Never published on the bus.
    Error {
        /// What went wrong.
        message: String,
        /// When the event was produced.
        timestamp: DateTime<Utc>,
    },

    /// Terminal event of a run.
    End {
        /// Run that ended.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        run_id: Option<RunId>,
        /// Item that was sold.
        item_name: String,
        /// Hammer price.
        final_price: i64,
        /// Winning bidder.
        winner: String,
        /// Terminal message, e.g. `"SOLD!"`.
        message: String,
        /// When the event was produced.
        timestamp: DateTime<Utc>,
    },
}

impl StateChangeEvent {
    /// Builds an `update` event from a snapshot.
    #[must_use]
    pub fn update(state: &AuctionState, message: Option<String>) -> Self {
        Self::Update {
            run_id: state.run_id,
            item_name: state.item_name.clone(),
            price: state.current_price,
            bidder: state.high_bidder.clone(),
            time_left: state.time_left_seconds,
            message,
            timestamp: Utc::now(),
        }
    }

    /// Builds the `end` event for a finished run.
    #[must_use]
    pub fn end(state: &AuctionState) -> Self {
        Self::End {
            run_id: state.run_id,
            item_name: state.item_name.clone(),
            final_price: state.current_price,
            winner: state.high_bidder.clone(),
            message: SOLD_MESSAGE.to_string(),
            timestamp: Utc::now(),
        }
    }

    /// Builds an `error` event.
    #[must_use]
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
            timestamp: Utc::now(),
        }
    }

    /// Synthesises the event a viewer should see for a freshly read snapshot:
    /// `end` for a finished run, `update` otherwise.
    #[must_use]
    pub fn from_snapshot(state: &AuctionState) -> Self {
        if !state.running && state.run_id.is_some() {
            Self::end(state)
        } else {
            Self::update(state, None)
        }
    }

    /// Returns the run this event belongs to, if any.
    #[must_use]
    pub const fn run_id(&self) -> Option<RunId> {
        match self {
            Self::Update { run_id, .. } | Self::End { run_id, .. } => *run_id,
            Self::Error { .. } => None,
        }
    }

    /// Returns the event type as a static string slice.
    #[must_use]
    pub const fn event_type_str(&self) -> &'static str {
        match self {
            Self::Update { .. } => "update",
            Self::Error { .. } => "error",
            Self::End { .. } => "end",
        }
    }
}
