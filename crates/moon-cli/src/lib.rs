//! # moon-cli: Batch Commands for the Agent Tracker
//!
//! ## Subcommands
//!
//! - `moon ingest`: pull unprocessed CSV sales files from a bucket prefix
//!   into the sales table.
//! - `moon aggregate`: compute the sales summaries and load them into the
//!   warehouse.
//! - `moon migrate`: apply the operational schema.
//!
//! ```bash
//! moon ingest --bucket moon-sales --prefix 2024/06/ --archive-path processed/
//! moon aggregate --sales-threshold 25000 --create-tables
//! ```
//!
//! Connection settings come from the environment (`DB_*`, `REDSHIFT_DB_*`,
//! `AWS_*`). Reports are printed to stdout as JSON.

pub mod aggregate;
pub mod ingest;
pub mod migrate;
