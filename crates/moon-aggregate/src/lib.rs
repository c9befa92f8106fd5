//! # moon-aggregate: Sales Aggregation Job
//!
//! Runs fixed summary queries over the operational database and loads the
//! results row by row into an analytics warehouse that speaks the Postgres
//! wire protocol (Redshift in production).
//!
//! ## Summaries
//!
//! | Table                | Contents |
//! |----------------------|----------|
//! | `best_teams`         | Sales total and distinct selling agents per branch. |
//! | `top_products`       | Products whose total sales reach the threshold (default 10 000). |
//! | `branch_performance` | Agents and sales total per branch name. |
//!
//! The job is generic over [`SummarySource`] and [`WarehouseSink`], so the
//! ordering and abort behaviour can be exercised without a database.

pub mod config;
pub mod job;
pub mod summary;

pub use config::WarehouseConfig;
pub use job::{
    AggregationJob, AggregationReport, PgSummarySource, PgWarehouse, SummarySource, WarehouseSink,
};
pub use summary::{
    BestTeam, BranchPerformance, TopProduct, WarehouseRow, DEFAULT_SALES_THRESHOLD,
};

/// Aggregation failures.
#[derive(Debug, thiserror::Error)]
pub enum AggregateError {
    /// Warehouse settings were invalid.
    #[error(transparent)]
    Config(#[from] moon_db::ConfigError),

    /// Connecting to either database failed.
    #[error(transparent)]
    Db(#[from] moon_db::DbError),

    /// A summary query failed.
    #[error("summary query for {summary} failed: {source}")]
    Query {
        /// Summary being computed.
        summary: &'static str,
        /// Underlying database error.
        #[source]
        source: sqlx::Error,
    },

    /// Loading rows into the warehouse failed.
    #[error("loading warehouse table {table} failed: {source}")]
    Load {
        /// Destination table.
        table: &'static str,
        /// Underlying database error.
        #[source]
        source: sqlx::Error,
    },

    /// Creating warehouse tables failed.
    #[error("creating warehouse tables failed: {source}")]
    Schema {
        /// Underlying database error.
        #[source]
        source: sqlx::Error,
    },
}

/// Connect to the warehouse described by `config`.
pub async fn connect_warehouse(config: &WarehouseConfig) -> Result<sqlx::PgPool, AggregateError> {
    let db = moon_db::DbConfig {
        max_connections: config.max_connections,
        ..moon_db::DbConfig::new(config.settings.clone())
    };
    Ok(moon_db::connect(&db).await?)
}
