//! # Migrate Subcommand

use anyhow::{Context, Result};
use clap::Args;

use moon_db::DbConfig;

/// Arguments for the `moon migrate` subcommand.
#[derive(Args, Debug)]
pub struct MigrateArgs {}

/// Apply the embedded schema migrations to the `DB_*` database.
pub async fn run_migrate(_args: &MigrateArgs) -> Result<u8> {
    let config = DbConfig::from_env().context("invalid database settings")?;
    let pool = moon_db::connect(&config).await?;
    moon_db::migrate(&pool).await?;
    Ok(0)
}
