//! Ingestion configuration.
//!
//! Everything the orchestrator needs at run time is carried by
//! [`IngestConfig`] and handed to the constructor. Nothing is read from the
//! environment once a run has started.

use std::path::PathBuf;
use std::time::Duration;

use moon_core::{SqlIdentifier, ValidationError};
use moon_db::env_lookup;

/// How a batch reacts to a failing file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FailurePolicy {
    /// Stop at the first failing file and return its error.
    #[default]
    AbortBatch,
    /// Record the failure in the report and move on to the next file.
    ContinueOnError,
}

/// Orchestrator configuration.
#[derive(Debug, Clone)]
pub struct IngestConfig {
    /// Directory files are downloaded into before loading.
    pub staging_dir: PathBuf,
    /// Destination table for CSV rows.
    pub table: SqlIdentifier,
    /// Behaviour when a single file fails.
    pub failure_policy: FailurePolicy,
}

impl IngestConfig {
    /// Stage into `staging_dir`, load into `sales_transaction`, abort on failure.
    pub fn new(staging_dir: impl Into<PathBuf>) -> Self {
        Self {
            staging_dir: staging_dir.into(),
            table: SqlIdentifier::sales_transaction(),
            failure_policy: FailurePolicy::AbortBatch,
        }
    }

    /// Override the destination table.
    pub fn with_table(mut self, table: SqlIdentifier) -> Self {
        self.table = table;
        self
    }

    /// Override the failure policy.
    pub fn with_failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.failure_policy = policy;
        self
    }

    /// Load from environment variables.
    ///
    /// - `DOWNLOAD_DIR` (default: `<system temp>/moon-ingest`)
    /// - `INGEST_TABLE` (default: `sales_transaction`)
    /// - `INGEST_CONTINUE_ON_ERROR` (default: `false`)
    pub fn from_env() -> Result<Self, ConfigError> {
        let staging_dir = env_lookup("DOWNLOAD_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| std::env::temp_dir().join("moon-ingest"));

        let mut config = Self::new(staging_dir);
        if let Some(raw) = env_lookup("INGEST_TABLE") {
            config.table = SqlIdentifier::new(&raw).map_err(ConfigError::InvalidTable)?;
        }
        if parse_flag("INGEST_CONTINUE_ON_ERROR")? {
            config.failure_policy = FailurePolicy::ContinueOnError;
        }
        Ok(config)
    }
}

/// Settings for the S3 client built per bucket.
///
/// Credentials, region, and endpoint come from the standard `AWS_*`
/// variables read by `object_store`; only the request timeout is ours.
#[derive(Debug, Clone, Copy)]
pub struct ObjectStoreSettings {
    /// Per-request HTTP timeout.
    pub timeout: Duration,
}

impl Default for ObjectStoreSettings {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
        }
    }
}

impl ObjectStoreSettings {
    /// Load from `INGEST_HTTP_TIMEOUT_SECS` (default: 30).
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut settings = Self::default();
        if let Some(raw) = env_lookup("INGEST_HTTP_TIMEOUT_SECS") {
            let secs = raw.parse::<u64>().map_err(|_| ConfigError::InvalidNumber {
                var: "INGEST_HTTP_TIMEOUT_SECS",
                value: raw,
            })?;
            settings.timeout = Duration::from_secs(secs);
        }
        Ok(settings)
    }
}

fn parse_flag(var: &'static str) -> Result<bool, ConfigError> {
    match env_lookup(var) {
        None => Ok(false),
        Some(raw) => parse_bool(&raw).ok_or(ConfigError::InvalidFlag { var, value: raw }),
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Ingestion configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// `INGEST_TABLE` is not a plain SQL identifier.
    #[error("INGEST_TABLE: {0}")]
    InvalidTable(#[source] ValidationError),
    /// A boolean variable held something other than true/false.
    #[error("{var} must be a boolean, got \"{value}\"")]
    InvalidFlag {
        /// Variable name.
        var: &'static str,
        /// Raw value.
        value: String,
    },
    /// A numeric variable did not parse.
    #[error("{var} must be a non-negative integer, got \"{value}\"")]
    InvalidNumber {
        /// Variable name.
        var: &'static str,
        /// Raw value.
        value: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_uses_defaults() {
        let config = IngestConfig::new("/tmp/stage");
        assert_eq!(config.table.as_str(), "sales_transaction");
        assert_eq!(config.failure_policy, FailurePolicy::AbortBatch);
        assert_eq!(config.staging_dir, PathBuf::from("/tmp/stage"));
    }

    #[test]
    fn builders_override_fields() {
        let table = SqlIdentifier::new("sales_import").unwrap();
        let config = IngestConfig::new("/tmp/stage")
            .with_table(table.clone())
            .with_failure_policy(FailurePolicy::ContinueOnError);
        assert_eq!(config.table, table);
        assert_eq!(config.failure_policy, FailurePolicy::ContinueOnError);
    }

    #[test]
    fn parse_bool_accepts_common_spellings() {
        assert_eq!(parse_bool("TRUE"), Some(true));
        assert_eq!(parse_bool(" yes "), Some(true));
        assert_eq!(parse_bool("0"), Some(false));
        assert_eq!(parse_bool("off"), Some(false));
        assert_eq!(parse_bool("maybe"), None);
    }

    #[test]
    fn default_timeout_is_thirty_seconds() {
        assert_eq!(ObjectStoreSettings::default().timeout, Duration::from_secs(30));
    }
}
