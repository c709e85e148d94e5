//! Shared application state injected into all Axum handlers.

use std::sync::Arc;

use crate::service::AuctionService;
use crate::ws::ConnectionRegistry;

/// Shared application state available to all handlers via Axum's
/// `State` extractor.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Auction service for all commands.
    pub service: AuctionService,
    /// Viewers connected to this replica.
    pub registry: Arc<ConnectionRegistry>,
    /// Identity of this replica.
    pub replica_id: Arc<str>,
    /// Outbound queue length per viewer.
    pub connection_queue_capacity: usize,
}
