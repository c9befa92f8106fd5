//! # Ingest Subcommand
//!
//! One ingestion run over `--bucket`/`--prefix`. Flags override the
//! matching environment settings.

use anyhow::{Context, Result};
use clap::Args;

use moon_core::SqlIdentifier;
use moon_db::DbConfig;
use moon_ingest::{FailurePolicy, IngestConfig, IngestRequest, ObjectStoreSettings};

/// Arguments for the `moon ingest` subcommand.
#[derive(Args, Debug)]
pub struct IngestArgs {
    /// Bucket to read sales files from.
    #[arg(long)]
    pub bucket: String,

    /// Key prefix inside the bucket.
    #[arg(long)]
    pub prefix: String,

    /// Move processed files under this prefix.
    #[arg(long)]
    pub archive_path: Option<String>,

    /// Record failing files in the report and keep going.
    #[arg(long)]
    pub continue_on_error: bool,

    /// Destination table (overrides `INGEST_TABLE`).
    #[arg(long)]
    pub table: Option<String>,
}

impl IngestArgs {
    fn ingest_config(&self) -> Result<IngestConfig> {
        let mut config = IngestConfig::from_env().context("invalid ingestion settings")?;
        if let Some(table) = &self.table {
            config = config.with_table(
                SqlIdentifier::new(table).with_context(|| format!("invalid --table {table:?}"))?,
            );
        }
        if self.continue_on_error {
            config = config.with_failure_policy(FailurePolicy::ContinueOnError);
        }
        Ok(config)
    }
}

/// Execute the ingest subcommand.
///
/// Returns exit code 0 when every file was skipped or ingested, 1 when some
/// files failed under `--continue-on-error`.
pub async fn run_ingest(args: &IngestArgs) -> Result<u8> {
    let request = IngestRequest::new(args.bucket.as_str(), args.prefix.as_str())?
        .with_archive_path(args.archive_path.clone());
    let config = args.ingest_config()?;
    let settings = ObjectStoreSettings::from_env().context("invalid object store settings")?;

    let db = DbConfig::from_env().context("invalid database settings")?;
    let pool = moon_db::connect(&db).await?;

    let service = moon_ingest::s3_service(pool, settings, config);
    let report = service
        .run(&request)
        .await
        .with_context(|| format!("ingestion of s3://{}/{} failed", args.bucket, args.prefix))?;

    println!("{}", serde_json::to_string_pretty(&report)?);
    tracing::info!(
        ingested = report.ingested,
        skipped = report.skipped,
        failed = report.failed,
        rows = report.rows_loaded,
        "ingestion finished"
    );
    Ok(if report.failed > 0 { 1 } else { 0 })
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct Wrapper {
        #[command(flatten)]
        args: IngestArgs,
    }

    #[test]
    fn parses_required_and_optional_flags() {
        let w = Wrapper::try_parse_from([
            "moon",
            "--bucket",
            "moon-sales",
            "--prefix",
            "2024/06/",
            "--archive-path",
            "processed/",
            "--continue-on-error",
        ])
        .unwrap();
        assert_eq!(w.args.bucket, "moon-sales");
        assert_eq!(w.args.prefix, "2024/06/");
        assert_eq!(w.args.archive_path.as_deref(), Some("processed/"));
        assert!(w.args.continue_on_error);
    }

    #[test]
    fn bucket_is_required() {
        assert!(Wrapper::try_parse_from(["moon", "--prefix", "2024/"]).is_err());
    }

    #[test]
    fn invalid_table_is_rejected() {
        let w = Wrapper::try_parse_from([
            "moon", "--bucket", "b", "--prefix", "p", "--table", "sales; DROP",
        ])
        .unwrap();
        assert!(w.args.ingest_config().is_err());
    }
}
