//! # Relational Store Adapter
//!
//! Persists processed-file fingerprints and appends parsed CSV rows to the
//! destination table.
//!
//! The fingerprint check and the fingerprint insert are separate operations.
//! Two runs over the same prefix at the same time can both see a file as
//! unprocessed; the second `record_hash` then fails with
//! [`StoreError::Duplicate`] after its rows were already appended. Runs are
//! expected to be serialized by the caller.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use moon_core::{Fingerprint, SqlIdentifier};
use parking_lot::RwLock;
use sqlx::PgPool;

use crate::csv_load::SalesBatch;

/// Store operation failures.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A uniqueness constraint rejected the write.
    #[error("duplicate entry: {0}")]
    Duplicate(String),

    /// Any other database failure, surfaced unchanged.
    #[error("database error: {0}")]
    Database(#[source] sqlx::Error),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db) = &err {
            if db.is_unique_violation() {
                return Self::Duplicate(db.message().to_string());
            }
        }
        Self::Database(err)
    }
}

/// Persistence the ingestion orchestrator depends on.
#[async_trait]
pub trait IngestionStore: Send + Sync {
    /// Whether `fingerprint` has been recorded. Absence is `false`, not an error.
    async fn hash_exists(&self, fingerprint: &Fingerprint) -> Result<bool, StoreError>;

    /// Record `fingerprint` as processed.
    async fn record_hash(&self, fingerprint: &Fingerprint) -> Result<(), StoreError>;

    /// Append every row in `batch` to `table`, returning the number appended.
    async fn append_rows(&self, table: &SqlIdentifier, batch: &SalesBatch)
        -> Result<u64, StoreError>;
}

/// [`IngestionStore`] over a Postgres pool.
///
/// Each call checks out its own connection and returns it when the call
/// finishes, whether it succeeded or not.
#[derive(Debug, Clone)]
pub struct PgIngestionStore {
    pool: PgPool,
}

impl PgIngestionStore {
    /// Wrap an existing pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl IngestionStore for PgIngestionStore {
    async fn hash_exists(&self, fingerprint: &Fingerprint) -> Result<bool, StoreError> {
        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM file_hash WHERE file_hash = $1)")
                .bind(fingerprint.as_str())
                .fetch_one(&self.pool)
                .await?;
        Ok(exists)
    }

    async fn record_hash(&self, fingerprint: &Fingerprint) -> Result<(), StoreError> {
        sqlx::query("INSERT INTO file_hash (file_hash, created_at) VALUES ($1, now())")
            .bind(fingerprint.as_str())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn append_rows(
        &self,
        table: &SqlIdentifier,
        batch: &SalesBatch,
    ) -> Result<u64, StoreError> {
        if batch.is_empty() {
            return Ok(0);
        }

        // Postgres converts each JSON text value to the column's type.
        let columns = batch
            .columns()
            .iter()
            .map(SqlIdentifier::quoted)
            .collect::<Vec<_>>()
            .join(", ");
        let table = table.quoted();
        let sql = format!(
            "INSERT INTO {table} ({columns}) \
             SELECT {columns} FROM json_populate_recordset(NULL::{table}, $1::json)"
        );

        let mut tx = self.pool.begin().await?;
        let result = sqlx::query(&sql)
            .bind(sqlx::types::Json(batch.to_records()))
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(result.rows_affected())
    }
}

/// A row as stored by [`MemoryIngestionStore`]: column name to value.
pub type MemoryRow = BTreeMap<String, Option<String>>;

#[derive(Debug, Default)]
struct MemoryState {
    hashes: HashSet<Fingerprint>,
    tables: HashMap<String, Vec<MemoryRow>>,
}

/// In-process [`IngestionStore`] for tests and dry runs.
#[derive(Debug, Clone, Default)]
pub struct MemoryIngestionStore {
    state: Arc<RwLock<MemoryState>>,
}

impl MemoryIngestionStore {
    /// An empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark `fingerprint` as already processed.
    pub fn seed_hash(&self, fingerprint: Fingerprint) {
        self.state.write().hashes.insert(fingerprint);
    }

    /// All recorded fingerprints, sorted.
    pub fn recorded(&self) -> Vec<Fingerprint> {
        let mut hashes: Vec<_> = self.state.read().hashes.iter().cloned().collect();
        hashes.sort();
        hashes
    }

    /// Rows appended to `table`, in append order.
    pub fn rows(&self, table: &str) -> Vec<MemoryRow> {
        self.state
            .read()
            .tables
            .get(table)
            .cloned()
            .unwrap_or_default()
    }
}

#[async_trait]
impl IngestionStore for MemoryIngestionStore {
    async fn hash_exists(&self, fingerprint: &Fingerprint) -> Result<bool, StoreError> {
        Ok(self.state.read().hashes.contains(fingerprint))
    }

    async fn record_hash(&self, fingerprint: &Fingerprint) -> Result<(), StoreError> {
        if !self.state.write().hashes.insert(fingerprint.clone()) {
            return Err(StoreError::Duplicate(format!(
                "file_hash {fingerprint} already recorded"
            )));
        }
        Ok(())
    }

    async fn append_rows(
        &self,
        table: &SqlIdentifier,
        batch: &SalesBatch,
    ) -> Result<u64, StoreError> {
        let rows: Vec<MemoryRow> = batch
            .rows()
            .iter()
            .map(|row| {
                batch
                    .columns()
                    .iter()
                    .map(|c| c.as_str().to_string())
                    .zip(row.iter().cloned())
                    .collect()
            })
            .collect();
        let appended = rows.len() as u64;
        self.state
            .write()
            .tables
            .entry(table.as_str().to_string())
            .or_default()
            .extend(rows);
        Ok(appended)
    }
}
