//! # Aggregate Subcommand
//!
//! Reads from the operational database (`DB_*`) and writes to the
//! warehouse (`REDSHIFT_DB_*`).

use anyhow::{Context, Result};
use clap::Args;

use moon_aggregate::{
    AggregationJob, PgSummarySource, PgWarehouse, WarehouseConfig, DEFAULT_SALES_THRESHOLD,
};
use moon_db::DbConfig;

/// Arguments for the `moon aggregate` subcommand.
#[derive(Args, Debug)]
pub struct AggregateArgs {
    /// Minimum total sales for a product to count as a top product.
    #[arg(long, default_value_t = DEFAULT_SALES_THRESHOLD)]
    pub sales_threshold: i64,

    /// Create the warehouse tables first if they are missing.
    #[arg(long)]
    pub create_tables: bool,
}

/// Execute the aggregate subcommand.
pub async fn run_aggregate(args: &AggregateArgs) -> Result<u8> {
    let source_config = DbConfig::from_env().context("invalid database settings")?;
    let warehouse_config = WarehouseConfig::from_env().context("invalid warehouse settings")?;

    let source = PgSummarySource::new(moon_db::connect(&source_config).await?);
    let warehouse = PgWarehouse::new(moon_aggregate::connect_warehouse(&warehouse_config).await?);

    if args.create_tables {
        warehouse.create_tables().await?;
    }

    let report = AggregationJob::new(source, warehouse)
        .with_sales_threshold(args.sales_threshold)
        .run()
        .await
        .context("aggregation failed")?;

    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct Wrapper {
        #[command(flatten)]
        args: AggregateArgs,
    }

    #[test]
    fn threshold_defaults() {
        let w = Wrapper::try_parse_from(["moon"]).unwrap();
        assert_eq!(w.args.sales_threshold, DEFAULT_SALES_THRESHOLD);
        assert!(!w.args.create_tables);
    }

    #[test]
    fn threshold_override() {
        let w = Wrapper::try_parse_from(["moon", "--sales-threshold", "2500"]).unwrap();
        assert_eq!(w.args.sales_threshold, 2_500);
    }
}
