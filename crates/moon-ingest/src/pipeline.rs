//! # Ingestion Orchestrator
//!
//! Drives one run over a bucket prefix:
//!
//! ```text
//! LISTED ──► SKIPPED                                   (fingerprint recorded)
//!    └─────► DOWNLOADED ──► LOADED ──► RECORDED [──► ARCHIVED]
//! ```
//!
//! Files are processed one at a time in listing order. A file is skipped when
//! the fingerprint of its base name is already recorded, so a run that stops
//! part-way resumes from the first unrecorded file on the next attempt.
//! Recorded files are never rolled back.

use std::path::PathBuf;
use std::sync::Arc;

use moon_core::{Fingerprint, ObjectKey, ValidationError};
use serde::Serialize;

use crate::bucket::{ObjectSource, ObjectStoreError};
use crate::config::{FailurePolicy, IngestConfig};
use crate::csv_load::{LoadError, SalesBatch};
use crate::store::{IngestionStore, StoreError};

/// Ingestion failures.
#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    /// The listing returned no files.
    #[error("no files found in bucket \"{bucket}\" under \"{prefix}\"")]
    NoFiles {
        /// Bucket name.
        bucket: String,
        /// Listed prefix.
        prefix: String,
    },

    /// The request itself is unusable.
    #[error("invalid ingestion request: {0}")]
    InvalidRequest(#[from] ValidationError),

    /// Object storage failed.
    #[error(transparent)]
    ObjectStore(#[from] ObjectStoreError),

    /// The relational store failed.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// A staged file could not be parsed.
    #[error(transparent)]
    Csv(#[from] LoadError),

    /// A staged file could not be read.
    #[error("failed to read staged file {path}: {source}")]
    Io {
        /// Local path.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// A failure while processing a specific file.
    #[error("ingestion of \"{key}\" failed: {source}")]
    File {
        /// Object key being processed.
        key: String,
        /// What went wrong.
        #[source]
        source: Box<IngestError>,
    },
}

impl IngestError {
    /// The innermost error, unwrapping per-file context.
    pub fn root(&self) -> &IngestError {
        match self {
            Self::File { source, .. } => source.root(),
            other => other,
        }
    }
}

/// Where a file sits in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FileState {
    /// Returned by the listing.
    Listed,
    /// Already recorded; nothing done.
    Skipped,
    /// Copied to the staging directory.
    Downloaded,
    /// Rows appended to the destination table.
    Loaded,
    /// Fingerprint persisted.
    Recorded,
    /// Moved to the archive prefix.
    Archived,
}

impl std::fmt::Display for FileState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Listed => "LISTED",
            Self::Skipped => "SKIPPED",
            Self::Downloaded => "DOWNLOADED",
            Self::Loaded => "LOADED",
            Self::Recorded => "RECORDED",
            Self::Archived => "ARCHIVED",
        };
        f.write_str(s)
    }
}

/// One ingestion invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestRequest {
    /// Bucket to list.
    pub bucket_name: String,
    /// Prefix inside the bucket.
    pub file_path: String,
    /// Prefix processed files are moved under, if any.
    pub archive_path: Option<String>,
}

impl IngestRequest {
    /// Build a request, rejecting an empty bucket or prefix.
    pub fn new(
        bucket_name: impl Into<String>,
        file_path: impl Into<String>,
    ) -> Result<Self, ValidationError> {
        let bucket_name = bucket_name.into();
        let file_path = file_path.into();
        if bucket_name.trim().is_empty() {
            return Err(ValidationError::Empty {
                field: "bucket_name",
            });
        }
        if file_path.trim().is_empty() {
            return Err(ValidationError::Empty { field: "file_path" });
        }
        Ok(Self {
            bucket_name,
            file_path,
            archive_path: None,
        })
    }

    /// Move processed files under `archive_path`. Blank values are ignored.
    pub fn with_archive_path(mut self, archive_path: Option<String>) -> Self {
        self.archive_path = archive_path.filter(|p| !p.trim().is_empty());
        self
    }
}

/// Result of processing one file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum FileOutcome {
    /// The fingerprint was already recorded.
    Skipped {
        /// Object key.
        key: String,
        /// Fingerprint of the base name.
        fingerprint: String,
    },
    /// Rows were loaded and the fingerprint recorded.
    Ingested {
        /// Object key.
        key: String,
        /// Fingerprint of the base name.
        fingerprint: String,
        /// Rows appended to the destination table.
        rows: u64,
        /// New key, when the file was archived.
        #[serde(skip_serializing_if = "Option::is_none")]
        archived_to: Option<String>,
    },
    /// Processing failed (only under [`FailurePolicy::ContinueOnError`]).
    Failed {
        /// Object key.
        key: String,
        /// Error message.
        error: String,
    },
}

/// Per-run summary.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchReport {
    /// Files seen by the listing.
    pub listed: usize,
    /// Files skipped as already processed.
    pub skipped: usize,
    /// Files ingested in this run.
    pub ingested: usize,
    /// Files that failed.
    pub failed: usize,
    /// Total rows appended.
    pub rows_loaded: u64,
    /// Outcomes in processing order.
    pub files: Vec<FileOutcome>,
}

impl BatchReport {
    fn push(&mut self, outcome: FileOutcome) {
        match &outcome {
            FileOutcome::Skipped { .. } => self.skipped += 1,
            FileOutcome::Ingested { rows, .. } => {
                self.ingested += 1;
                self.rows_loaded += rows;
            }
            FileOutcome::Failed { .. } => self.failed += 1,
        }
        self.files.push(outcome);
    }
}

/// Runs ingestion over object storage into the relational store.
#[derive(Clone)]
pub struct IngestionService {
    source: Arc<dyn ObjectSource>,
    store: Arc<dyn IngestionStore>,
    config: IngestConfig,
}

impl std::fmt::Debug for IngestionService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IngestionService")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl IngestionService {
    /// Create a service over explicit collaborators.
    pub fn new(
        source: Arc<dyn ObjectSource>,
        store: Arc<dyn IngestionStore>,
        config: IngestConfig,
    ) -> Self {
        Self {
            source,
            store,
            config,
        }
    }

    /// The configuration this service was built with.
    pub fn config(&self) -> &IngestConfig {
        &self.config
    }

    /// Ingest every unprocessed file under the request prefix.
    ///
    /// Fails with [`IngestError::NoFiles`] when the listing is empty. Under
    /// [`FailurePolicy::AbortBatch`] the first failing file aborts the run;
    /// files recorded before it stay recorded.
    pub async fn run(&self, request: &IngestRequest) -> Result<BatchReport, IngestError> {
        let bucket = request.bucket_name.as_str();
        let keys = self.source.list(bucket, &request.file_path).await?;
        if keys.is_empty() {
            return Err(IngestError::NoFiles {
                bucket: bucket.to_string(),
                prefix: request.file_path.clone(),
            });
        }

        let mut report = BatchReport {
            listed: keys.len(),
            ..BatchReport::default()
        };

        for key in &keys {
            match self.process_file(request, key).await {
                Ok(outcome) => report.push(outcome),
                Err(err) => match self.config.failure_policy {
                    FailurePolicy::AbortBatch => {
                        tracing::warn!(bucket, key = %key, error = %err, "aborting batch");
                        return Err(IngestError::File {
                            key: key.as_str().to_string(),
                            source: Box::new(err),
                        });
                    }
                    FailurePolicy::ContinueOnError => {
                        tracing::warn!(bucket, key = %key, error = %err, "file failed, continuing");
                        report.push(FileOutcome::Failed {
                            key: key.as_str().to_string(),
                            error: err.to_string(),
                        });
                    }
                },
            }
        }

        tracing::info!(
            bucket,
            prefix = %request.file_path,
            listed = report.listed,
            skipped = report.skipped,
            ingested = report.ingested,
            failed = report.failed,
            rows = report.rows_loaded,
            "ingestion run finished"
        );
        Ok(report)
    }

    async fn process_file(
        &self,
        request: &IngestRequest,
        key: &ObjectKey,
    ) -> Result<FileOutcome, IngestError> {
        let bucket = request.bucket_name.as_str();
        let fingerprint = Fingerprint::of_key(key);
        tracing::debug!(bucket, key = %key, fingerprint = %fingerprint, state = %FileState::Listed);

        if self.store.hash_exists(&fingerprint).await? {
            tracing::info!(bucket, key = %key, fingerprint = %fingerprint, state = %FileState::Skipped, "file already processed");
            return Ok(FileOutcome::Skipped {
                key: key.as_str().to_string(),
                fingerprint: fingerprint.as_str().to_string(),
            });
        }

        let staged = self.config.staging_dir.join(key.file_name()?);
        self.source.download(bucket, key, &staged).await?;
        tracing::info!(bucket, key = %key, path = %staged.display(), state = %FileState::Downloaded);

        let batch = SalesBatch::from_path(&staged).await?;
        let rows = self.store.append_rows(&self.config.table, &batch).await?;
        tracing::info!(bucket, key = %key, table = %self.config.table, rows, state = %FileState::Loaded);

        self.store.record_hash(&fingerprint).await?;
        tracing::info!(bucket, key = %key, fingerprint = %fingerprint, state = %FileState::Recorded);

        let archived_to = match &request.archive_path {
            Some(prefix) => {
                let moved = self.source.archive(bucket, key, prefix).await?;
                tracing::info!(bucket, key = %key, archived_to = %moved, state = %FileState::Archived);
                Some(moved.as_str().to_string())
            }
            None => None,
        };

        Ok(FileOutcome::Ingested {
            key: key.as_str().to_string(),
            fingerprint: fingerprint.as_str().to_string(),
            rows,
            archived_to,
        })
    }
}
