//! # moon-ingest: Sales File Ingestion
//!
//! Pulls CSV sales files from object storage into the relational database.
//! Each file is identified by a [`moon_core::Fingerprint`] of its base name;
//! files whose fingerprint is already recorded are skipped, so re-running a
//! prefix is idempotent.
//!
//! ## Components
//!
//! - [`bucket`]: object-store client ([`ObjectSource`], [`ObjectStoreClient`]).
//! - [`store`]: fingerprint and row persistence ([`IngestionStore`],
//!   [`PgIngestionStore`], [`MemoryIngestionStore`]).
//! - [`csv_load`]: parsing staged files into a [`SalesBatch`].
//! - [`pipeline`]: the orchestrator ([`IngestionService`]).
//! - [`config`]: [`IngestConfig`] and [`FailurePolicy`], injected at
//!   construction.
//!
//! ## Concurrency
//!
//! A run awaits each step before starting the next. Concurrent runs against
//! the same destination are not safe; see [`store`].

pub mod bucket;
pub mod config;
pub mod csv_load;
pub mod pipeline;
pub mod store;

use std::sync::Arc;

use sqlx::PgPool;

pub use bucket::{
    BucketResolver, ObjectSource, ObjectStoreClient, ObjectStoreError, S3Buckets, StaticBuckets,
};
pub use config::{ConfigError, FailurePolicy, IngestConfig, ObjectStoreSettings};
pub use csv_load::{LoadError, SalesBatch};
pub use pipeline::{
    BatchReport, FileOutcome, FileState, IngestError, IngestRequest, IngestionService,
};
pub use store::{IngestionStore, MemoryIngestionStore, PgIngestionStore, StoreError};

/// Production wiring: S3 buckets from `AWS_*` settings and Postgres on `pool`.
pub fn s3_service(
    pool: PgPool,
    settings: ObjectStoreSettings,
    config: IngestConfig,
) -> IngestionService {
    IngestionService::new(
        Arc::new(ObjectStoreClient::s3(settings)),
        Arc::new(PgIngestionStore::new(pool)),
        config,
    )
}
