//! # moon CLI entry point
//!
//! Parses command-line arguments and dispatches to subcommand handlers.

use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use moon_cli::aggregate::{run_aggregate, AggregateArgs};
use moon_cli::ingest::{run_ingest, IngestArgs};
use moon_cli::migrate::{run_migrate, MigrateArgs};

/// Moon agent tracker batch tooling.
#[derive(Parser, Debug)]
#[command(name = "moon", version, about, long_about = None)]
struct Cli {
    /// Enable verbose output. Repeat for more verbosity (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Ingest unprocessed sales files from object storage.
    Ingest(IngestArgs),

    /// Compute sales summaries and load them into the warehouse.
    Aggregate(AggregateArgs),

    /// Apply the operational database schema.
    Migrate(MigrateArgs),
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // RUST_LOG wins when set; otherwise -v raises the level.
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| match cli.verbose {
        0 => EnvFilter::new("info"),
        1 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let result = match &cli.command {
        Commands::Ingest(args) => run_ingest(args).await,
        Commands::Aggregate(args) => run_aggregate(args).await,
        Commands::Migrate(args) => run_migrate(args).await,
    };

    match result {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            tracing::error!("{e:#}");
            ExitCode::from(2)
        }
    }
}
