//! Replica assembly: backends, background tasks, and the HTTP router.
//!
//! A replica is stateless apart from its viewer registry. Everything it
//! shares with its peers is in [`Backends`]; two replicas built over clones
//! of the same `Backends` behave like two processes behind a load balancer.

use std::sync::Arc;

use axum::Router;
use axum::routing::get;
use tokio::task::JoinHandle;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::api;
use crate::app_state::AppState;
use crate::channel::{LocalChannel, PgNotifyChannel, UpdateChannel};
use crate::config::{AuctionConfig, StoreBackend};
use crate::error::AuctionError;
use crate::persistence::{BidRecorder, MemoryBidLog, PostgresBidLog};
use crate::service::{AuctionService, Countdown};
use crate::store::{MemoryStore, PostgresStore, StateStore};
use crate::ws::handler::ws_handler;
use crate::ws::{ConnectionRegistry, Relay};

/// Shared store, update channel, and bid log used by a replica.
#[derive(Debug, Clone)]
pub struct Backends {
    /// Shared auction record.
    pub store: Arc<dyn StateStore>,
    /// Fan-out bus between replicas.
    pub channel: Arc<dyn UpdateChannel>,
    /// Write-behind bid log.
    pub recorder: BidRecorder,
}

impl Backends {
    /// In-process backends. Replicas only share state if they share these
    /// exact values.
    #[must_use]
    pub fn in_memory(config: &AuctionConfig) -> Self {
        let recorder = if config.persistence_enabled {
            BidRecorder::new(Arc::new(MemoryBidLog::new()))
        } else {
            BidRecorder::disabled()
        };
        Self {
            store: Arc::new(MemoryStore::new()),
            channel: Arc::new(LocalChannel::new(config.event_bus_capacity)),
            recorder,
        }
    }

    /// PostgreSQL backends: connects, runs migrations, and shares one pool
    /// between the store, the channel, and the bid log.
    ///
    /// # Errors
    ///
    /// Returns [`AuctionError::StoreUnavailable`] if the database cannot be
    /// reached or migrated.
    pub async fn postgres(config: &AuctionConfig) -> Result<Self, AuctionError> {
        let pool = crate::store::postgres::connect(config).await?;
        let recorder = if config.persistence_enabled {
            BidRecorder::new(Arc::new(PostgresBidLog::new(pool.clone())))
        } else {
            BidRecorder::disabled()
        };
        Ok(Self {
            store: Arc::new(PostgresStore::new(pool.clone())),
            channel: Arc::new(PgNotifyChannel::new(
                pool,
                config.update_channel_name.clone(),
            )),
            recorder,
        })
    }

    /// Builds the backends selected by `config.store_backend`.
    ///
    /// # Errors
    ///
    /// Returns [`AuctionError::StoreUnavailable`] if a remote backend cannot
    /// be reached.
    pub async fn from_config(config: &AuctionConfig) -> Result<Self, AuctionError> {
        match config.store_backend {
            StoreBackend::Memory => Ok(Self::in_memory(config)),
            StoreBackend::Postgres => Self::postgres(config).await,
        }
    }
}

/// A running replica: shared state for handlers plus its relay and
/// countdown tasks. Dropping it stops both tasks.
#[derive(Debug)]
pub struct Replica {
    state: AppState,
    relay: JoinHandle<()>,
    countdown: JoinHandle<()>,
}

impl Replica {
    /// Checks the store, subscribes the relay, and starts the countdown.
    ///
    /// # Errors
    ///
    /// Returns [`AuctionError::StoreUnavailable`] if the store does not
    /// answer and [`AuctionError::BusUnavailable`] if the update channel
    /// cannot be subscribed.
    pub async fn start(config: &AuctionConfig, backends: Backends) -> Result<Self, AuctionError> {
        backends.store.ping().await?;

        let registry = Arc::new(ConnectionRegistry::new());
        let relay = Relay::new(
            Arc::clone(&backends.channel),
            Arc::clone(&backends.store),
            Arc::clone(&registry),
            config.resubscribe_backoff,
        )
        .spawn()
        .await?;

        let service = AuctionService::new(
            backends.store,
            backends.channel,
            backends.recorder,
            config.rules,
        );

        let mut countdown = Countdown::new(service.clone(), config.tick_interval);
        if config.timer_lease_enabled {
            countdown = countdown.with_lease(config.replica_id.clone(), config.lease_ttl());
        }
        let countdown = countdown.spawn();

        tracing::info!(
            replica = %config.replica_id,
            lease = config.timer_lease_enabled,
            persistence = service.recorder().is_enabled(),
            "replica started"
        );

        Ok(Self {
            state: AppState {
                service,
                registry,
                replica_id: Arc::from(config.replica_id.as_str()),
                connection_queue_capacity: config.connection_queue_capacity,
            },
            relay,
            countdown,
        })
    }

    /// Returns the handler state.
    #[must_use]
    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// Builds the HTTP router serving this replica.
    #[must_use]
    pub fn router(&self) -> Router {
        build_router(self.state.clone())
    }
}

impl Drop for Replica {
    fn drop(&mut self) {
        self.relay.abort();
        self.countdown.abort();
    }
}

/// Composes REST, WebSocket, tracing, and CORS into one router.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(api::build_router())
        .route("/ws", get(ws_handler))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
