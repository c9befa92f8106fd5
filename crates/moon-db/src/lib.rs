//! # moon-db: Relational Store Plumbing
//!
//! Connection settings, pool construction, and the embedded schema for the
//! operational Postgres database shared by the agent API and the ingestion
//! pipeline. The analytics warehouse reuses [`PgSettings`] with its own
//! environment prefix (see `moon-aggregate`).
//!
//! ## Schema
//!
//! Migrations under `migrations/` create `branch`, `agent`, `product`,
//! `product_permission`, `sales_transaction`, `notification`, and
//! `file_hash`. They are embedded at compile time and applied by
//! [`migrate`].

pub mod config;

pub use config::{env_lookup, ConfigError, DbConfig, PgDefaults, PgSettings};

use std::time::Duration;

use sqlx::postgres::{PgPool, PgPoolOptions};

/// Errors raised while connecting to or migrating the database.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    /// Connection settings could not be assembled.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The pool could not connect.
    #[error("database connection failed: {0}")]
    Connect(#[source] sqlx::Error),

    /// A migration failed to apply.
    #[error("database migration failed: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),
}

/// Open a connection pool for the given configuration.
///
/// Every store operation checks a connection out of this pool for its own
/// lifetime and returns it on exit, success or failure.
pub async fn connect(config: &DbConfig) -> Result<PgPool, DbError> {
    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .acquire_timeout(Duration::from_secs(config.acquire_timeout_secs))
        .connect(config.settings.url())
        .await
        .map_err(DbError::Connect)?;

    tracing::info!(endpoint = %config.settings.endpoint_label(), "connected to PostgreSQL");
    Ok(pool)
}

/// Apply the embedded schema migrations.
pub async fn migrate(pool: &PgPool) -> Result<(), DbError> {
    sqlx::migrate!("./migrations").run(pool).await?;
    tracing::info!("database migrations applied");
    Ok(())
}

/// Connect using `DB_*` environment settings and apply migrations.
///
/// Returns `None` when no database is configured (`DB_STRING` and
/// `DB_ENDPOINT` both unset), so callers can fall back to in-memory mode.
pub async fn init_pool() -> Result<Option<PgPool>, DbError> {
    let config = match DbConfig::from_env_optional()? {
        Some(config) => config,
        None => {
            tracing::warn!(
                "DB_STRING/DB_ENDPOINT not set; running in-memory only mode. \
                 State will not survive restarts."
            );
            return Ok(None);
        }
    };

    let pool = connect(&config).await?;
    migrate(&pool).await?;
    Ok(Some(pool))
}
