//! # Aggregation Job
//!
//! Computes `best_teams`, `top_products`, and `branch_performance` in that
//! order, loading each into the warehouse before computing the next. The
//! first failure aborts the job; tables already loaded keep their rows.

use async_trait::async_trait;
use serde::Serialize;
use sqlx::PgPool;

use crate::summary::{
    BestTeam, BranchPerformance, TopProduct, WarehouseRow, BEST_TEAMS_SQL,
    BRANCH_PERFORMANCE_SQL, TOP_PRODUCTS_SQL, WAREHOUSE_DDL,
};
use crate::AggregateError;

/// Where summaries are computed.
#[async_trait]
pub trait SummarySource: Send + Sync {
    /// Branch totals, highest first.
    async fn best_teams(&self) -> Result<Vec<BestTeam>, AggregateError>;
    /// Products with total sales at or above `threshold`, highest first.
    async fn top_products(&self, threshold: i64) -> Result<Vec<TopProduct>, AggregateError>;
    /// Per-branch performance, highest sales first.
    async fn branch_performance(&self) -> Result<Vec<BranchPerformance>, AggregateError>;
}

/// Where summaries are written.
#[async_trait]
pub trait WarehouseSink: Send + Sync {
    /// Insert `rows` into `R::TABLE`, returning the number inserted.
    async fn load<R: WarehouseRow>(&self, rows: &[R]) -> Result<u64, AggregateError>;
}

/// [`SummarySource`] over the operational Postgres database.
#[derive(Debug, Clone)]
pub struct PgSummarySource {
    pool: PgPool,
}

impl PgSummarySource {
    /// Wrap an operational database pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SummarySource for PgSummarySource {
    async fn best_teams(&self) -> Result<Vec<BestTeam>, AggregateError> {
        sqlx::query_as(BEST_TEAMS_SQL)
            .fetch_all(&self.pool)
            .await
            .map_err(|source| AggregateError::Query {
                summary: BestTeam::TABLE,
                source,
            })
    }

    async fn top_products(&self, threshold: i64) -> Result<Vec<TopProduct>, AggregateError> {
        sqlx::query_as(TOP_PRODUCTS_SQL)
            .bind(threshold)
            .fetch_all(&self.pool)
            .await
            .map_err(|source| AggregateError::Query {
                summary: TopProduct::TABLE,
                source,
            })
    }

    async fn branch_performance(&self) -> Result<Vec<BranchPerformance>, AggregateError> {
        sqlx::query_as(BRANCH_PERFORMANCE_SQL)
            .fetch_all(&self.pool)
            .await
            .map_err(|source| AggregateError::Query {
                summary: BranchPerformance::TABLE,
                source,
            })
    }
}

/// [`WarehouseSink`] over a Redshift-compatible Postgres connection.
///
/// Rows are inserted one statement at a time inside a transaction per table.
#[derive(Debug, Clone)]
pub struct PgWarehouse {
    pool: PgPool,
}

impl PgWarehouse {
    /// Wrap a warehouse pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create the summary tables if they are missing.
    pub async fn create_tables(&self) -> Result<(), AggregateError> {
        for ddl in WAREHOUSE_DDL {
            sqlx::query(ddl)
                .execute(&self.pool)
                .await
                .map_err(|source| AggregateError::Schema { source })?;
        }
        tracing::info!("warehouse tables ensured");
        Ok(())
    }
}

#[async_trait]
impl WarehouseSink for PgWarehouse {
    async fn load<R: WarehouseRow>(&self, rows: &[R]) -> Result<u64, AggregateError> {
        let err = |source| AggregateError::Load {
            table: R::TABLE,
            source,
        };

        let mut tx = self.pool.begin().await.map_err(err)?;
        for row in rows {
            row.bind(sqlx::query(R::INSERT))
                .execute(&mut *tx)
                .await
                .map_err(err)?;
        }
        tx.commit().await.map_err(err)?;
        Ok(rows.len() as u64)
    }
}

/// Rows loaded per warehouse table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AggregationReport {
    /// Rows written to `best_teams`.
    pub best_teams: u64,
    /// Rows written to `top_products`.
    pub top_products: u64,
    /// Rows written to `branch_performance`.
    pub branch_performance: u64,
}

/// Runs the three summaries end to end.
pub struct AggregationJob<S, W> {
    source: S,
    sink: W,
    sales_threshold: i64,
}

impl<S: SummarySource, W: WarehouseSink> AggregationJob<S, W> {
    /// Create a job using the default top-product threshold.
    pub fn new(source: S, sink: W) -> Self {
        Self {
            source,
            sink,
            sales_threshold: crate::summary::DEFAULT_SALES_THRESHOLD,
        }
    }

    /// Override the top-product threshold.
    pub fn with_sales_threshold(mut self, threshold: i64) -> Self {
        self.sales_threshold = threshold;
        self
    }

    /// Compute and load every summary, stopping at the first failure.
    pub async fn run(&self) -> Result<AggregationReport, AggregateError> {
        let mut report = AggregationReport::default();

        tracing::info!(table = BestTeam::TABLE, "aggregating best performing teams");
        let rows = self.source.best_teams().await?;
        report.best_teams = self.sink.load(&rows).await?;
        tracing::info!(table = BestTeam::TABLE, rows = report.best_teams, "loaded");

        tracing::info!(
            table = TopProduct::TABLE,
            threshold = self.sales_threshold,
            "aggregating top products"
        );
        let rows = self.source.top_products(self.sales_threshold).await?;
        report.top_products = self.sink.load(&rows).await?;
        tracing::info!(table = TopProduct::TABLE, rows = report.top_products, "loaded");

        tracing::info!(table = BranchPerformance::TABLE, "aggregating branch performance");
        let rows = self.source.branch_performance().await?;
        report.branch_performance = self.sink.load(&rows).await?;
        tracing::info!(
            table = BranchPerformance::TABLE,
            rows = report.branch_performance,
            "loaded"
        );

        tracing::info!("aggregation and loading complete");
        Ok(report)
    }
}
