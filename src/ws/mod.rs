//! WebSocket layer: viewer connections, the local registry, and the relay.
//!
//! The endpoint at `/ws` carries the viewer protocol: `bid` and `start`
//! commands in, `update`, `error` and `end` events out. The [`relay::Relay`]
//! feeds update-channel events into the [`registry::ConnectionRegistry`],
//! which fans them out to every viewer on this replica.

pub mod connection;
pub mod handler;
pub mod messages;
pub mod registry;
pub mod relay;

pub use registry::{ConnectionId, ConnectionRegistry};
pub use relay::Relay;
