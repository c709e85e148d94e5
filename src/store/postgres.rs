//! PostgreSQL implementation of the shared state store.
//!
//! Fields live in the `auction_kv` table, one row per key. Every trait
//! method is a single statement, so it runs as one implicit transaction.
//! Operations that read and write several fields call the PL/pgSQL
//! functions from the migrations (`auction_compare_and_set`,
//! `auction_place_bid`, `auction_finish_run`), which keeps each of them in
//! one round trip. Rows are always locked in key order.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use sqlx::PgPool;
use sqlx::migrate::Migrator;
use sqlx::postgres::PgPoolOptions;

use super::{BidPlacement, StateStore};
use crate::config::AuctionConfig;
use crate::domain::{AuctionField, AuctionRules, AuctionState};
use crate::error::AuctionError;

/// Schema for the store, the lease table and the bid log.
pub static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

const COUNTDOWN_LEASE: &str = "countdown";

fn unavailable(err: sqlx::Error) -> AuctionError {
    AuctionError::StoreUnavailable(err.to_string())
}

/// Opens a connection pool sized from `config` and applies pending
/// migrations.
///
/// # Errors
///
/// Returns [`AuctionError::StoreUnavailable`] if the database cannot be
/// reached or a migration fails.
pub async fn connect(config: &AuctionConfig) -> Result<PgPool, AuctionError> {
    let pool = PgPoolOptions::new()
        .max_connections(config.database_max_connections)
        .min_connections(config.database_min_connections)
        .acquire_timeout(Duration::from_secs(config.database_connect_timeout_secs))
        .connect(&config.database_url)
        .await
        .map_err(unavailable)?;

    MIGRATOR
        .run(&pool)
        .await
        .map_err(|e| AuctionError::StoreUnavailable(format!("migration failed: {e}")))?;

    Ok(pool)
}

fn decode(rows: Vec<(String, String)>) -> AuctionState {
    let values: HashMap<AuctionField, String> = rows
        .into_iter()
        .filter_map(|(key, value)| AuctionField::from_key(&key).map(|f| (f, value)))
        .collect();
    AuctionState::from_lookup(|field| values.get(&field).map(String::as_str))
}

/// PostgreSQL-backed store using `sqlx::PgPool`.
#[derive(Debug, Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Creates a store over an already migrated connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl StateStore for PostgresStore {
    async fn get(&self, field: AuctionField) -> Result<Option<String>, AuctionError> {
        sqlx::query_scalar::<_, String>("SELECT value FROM auction_kv WHERE key = $1")
            .bind(field.key())
            .fetch_optional(&self.pool)
            .await
            .map_err(unavailable)
    }

    async fn set(&self, field: AuctionField, value: String) -> Result<(), AuctionError> {
        sqlx::query(
            "INSERT INTO auction_kv (key, value) VALUES ($1, $2) \
             ON CONFLICT (key) DO UPDATE SET value = EXCLUDED.value",
        )
        .bind(field.key())
        .bind(value)
        .execute(&self.pool)
        .await
        .map_err(unavailable)?;
        Ok(())
    }

    async fn set_many(&self, entries: &[(AuctionField, String)]) -> Result<(), AuctionError> {
        let (keys, values): (Vec<&str>, Vec<&str>) = entries
            .iter()
            .map(|(field, value)| (field.key(), value.as_str()))
            .unzip();

        sqlx::query(
            "INSERT INTO auction_kv (key, value) \
             SELECT k, v FROM UNNEST($1::TEXT[], $2::TEXT[]) AS t(k, v) ORDER BY k \
             ON CONFLICT (key) DO UPDATE SET value = EXCLUDED.value",
        )
        .bind(keys)
        .bind(values)
        .execute(&self.pool)
        .await
        .map_err(unavailable)?;
        Ok(())
    }

    async fn decrement_and_get(&self, field: AuctionField) -> Result<i64, AuctionError> {
        sqlx::query_scalar::<_, i64>(
            "INSERT INTO auction_kv (key, value) VALUES ($1, '-1') \
             ON CONFLICT (key) DO UPDATE SET value = (auction_kv.value::BIGINT - 1)::TEXT \
             RETURNING value::BIGINT",
        )
        .bind(field.key())
        .fetch_one(&self.pool)
        .await
        .map_err(unavailable)
    }

    async fn compare_and_set_bid(
        &self,
        price: AuctionField,
        bidder: AuctionField,
        new_price: i64,
        new_bidder: &str,
    ) -> Result<bool, AuctionError> {
        sqlx::query_scalar::<_, bool>("SELECT auction_compare_and_set($1, $2, $3, $4)")
            .bind(price.key())
            .bind(bidder.key())
            .bind(new_price)
            .bind(new_bidder)
            .fetch_one(&self.pool)
            .await
            .map_err(unavailable)
    }

    async fn place_bid(
        &self,
        amount: i64,
        bidder: &str,
        rules: AuctionRules,
    ) -> Result<BidPlacement, AuctionError> {
        let (status, item_name, time_left) =
            sqlx::query_as::<_, (String, Option<String>, Option<i64>)>(
                "SELECT status, item_name, time_left \
                 FROM auction_place_bid($1, $2, $3, $4, $5, $6, $7, $8, $9)",
            )
            .bind(AuctionField::Running.key())
            .bind(AuctionField::Price.key())
            .bind(AuctionField::Bidder.key())
            .bind(AuctionField::TimeLeft.key())
            .bind(AuctionField::Item.key())
            .bind(amount)
            .bind(bidder)
            .bind(rules.snipe_threshold_secs)
            .bind(rules.snipe_extension_secs)
            .fetch_one(&self.pool)
            .await
            .map_err(unavailable)?;

        match status.as_str() {
            "not_running" => Ok(BidPlacement::NotRunning),
            "too_low" => Ok(BidPlacement::TooLow),
            "accepted" => Ok(BidPlacement::Accepted {
                item_name: item_name.unwrap_or_default(),
                time_left: time_left.unwrap_or_default(),
            }),
            other => Err(AuctionError::StoreUnavailable(format!(
                "unexpected bid status {other:?}"
            ))),
        }
    }

    async fn finish_run(&self) -> Result<Option<AuctionState>, AuctionError> {
        let rows = sqlx::query_as::<_, (String, String)>(
            "SELECT field_key, field_value FROM auction_finish_run($1, $2)",
        )
        .bind(AuctionField::Running.key())
        .bind(AuctionField::TimeLeft.key())
        .fetch_all(&self.pool)
        .await
        .map_err(unavailable)?;

        if rows.is_empty() {
            return Ok(None);
        }
        Ok(Some(decode(rows)))
    }

    async fn try_acquire_lease(&self, owner: &str, ttl: Duration) -> Result<bool, AuctionError> {
        let holder = sqlx::query_scalar::<_, String>(
            "INSERT INTO auction_lease (name, owner, expires_at) \
             VALUES ($1, $2, now() + make_interval(secs => $3)) \
             ON CONFLICT (name) DO UPDATE \
             SET owner = EXCLUDED.owner, expires_at = EXCLUDED.expires_at \
             WHERE auction_lease.owner = EXCLUDED.owner OR auction_lease.expires_at <= now() \
             RETURNING owner",
        )
        .bind(COUNTDOWN_LEASE)
        .bind(owner)
        .bind(ttl.as_secs_f64())
        .fetch_optional(&self.pool)
        .await
        .map_err(unavailable)?;

        Ok(holder.is_some())
    }

    async fn snapshot(&self) -> Result<AuctionState, AuctionError> {
        let keys: Vec<&str> = AuctionField::ALL.iter().map(|f| f.key()).collect();
        let rows = sqlx::query_as::<_, (String, String)>(
            "SELECT key, value FROM auction_kv WHERE key = ANY($1)",
        )
        .bind(keys)
        .fetch_all(&self.pool)
        .await
        .map_err(unavailable)?;

        Ok(decode(rows))
    }

    async fn ping(&self) -> Result<(), AuctionError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(unavailable)?;
        Ok(())
    }
}
