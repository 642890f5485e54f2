//! PostgreSQL persistence for the lookup core.
//!
//! [`PgStore`] implements the three core store traits over one pool. Enum
//! columns are stored as their snake_case names and structured values as JSONB.

mod consultation;
mod history;
mod webhook;

use std::str::FromStr;
use std::time::Duration;

use radar_core::store::StoreError;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

/// PostgreSQL-backed store for consultations, history and webhooks.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Connect and apply the embedded migrations.
    pub async fn connect(
        database_url: &str,
        max_connections: u32,
        min_connections: u32,
    ) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .min_connections(min_connections)
            .acquire_timeout(Duration::from_secs(5))
            .connect(database_url)
            .await
            .map_err(|e| StoreError::Connection(e.to_string()))?;

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(|e| StoreError::Connection(format!("Migration error: {e}")))?;

        tracing::info!(max_connections, "Database connected and migrations applied");

        Ok(Self { pool })
    }

    /// Wrap an existing pool. Migrations are assumed to be applied.
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map(|_| ())
            .map_err(map_sqlx)
    }
}

/// Classify a driver error for the core.
pub(crate) fn map_sqlx(err: sqlx::Error) -> StoreError {
    match &err {
        sqlx::Error::Database(db) if db.is_unique_violation() => StoreError::Conflict(db.to_string()),
        sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
            StoreError::Connection(err.to_string())
        }
        sqlx::Error::ColumnDecode { .. } | sqlx::Error::Decode(_) => {
            StoreError::Serialization(err.to_string())
        }
        _ => StoreError::Query(err.to_string()),
    }
}

/// Parse an enum column written by this store.
pub(crate) fn parse_column<T>(column: &str, raw: &str) -> Result<T, StoreError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.parse()
        .map_err(|e| StoreError::Serialization(format!("Bad {column} value '{raw}': {e}")))
}
