//! # moon-api server
//!
//! Reads `PORT`, `AUTH_TOKEN`, the `DB_*` settings, and the ingestion
//! settings from the environment, then serves the agent tracker API.
//!
//! Without a database the API runs in-memory and ingestion is disabled.

use anyhow::Context;
use metrics_exporter_prometheus::PrometheusBuilder;
use moon_api::state::{AppConfig, AppState};
use moon_ingest::{IngestConfig, ObjectStoreSettings};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = AppConfig::from_env();
    let port = config.port;
    if config.auth_token.is_none() {
        tracing::warn!("AUTH_TOKEN not set; authentication is disabled");
    }

    let metrics = PrometheusBuilder::new()
        .install_recorder()
        .context("failed to install Prometheus recorder")?;

    let pool = moon_db::init_pool()
        .await
        .context("failed to initialise database")?;

    let mut state = AppState::with_config(config)
        .with_db(pool.clone())
        .with_metrics(metrics);

    match pool {
        Some(pool) => {
            let ingest = IngestConfig::from_env().context("invalid ingestion settings")?;
            let settings =
                ObjectStoreSettings::from_env().context("invalid object store settings")?;
            tracing::info!(
                table = %ingest.table,
                staging_dir = %ingest.staging_dir.display(),
                "ingestion enabled"
            );
            state = state.with_ingestion(moon_ingest::s3_service(pool, settings, ingest));
        }
        None => tracing::warn!("ingestion disabled: no database configured"),
    }

    state
        .hydrate_from_db()
        .await
        .map_err(anyhow::Error::msg)
        .context("failed to hydrate in-memory stores")?;

    let app = moon_api::app(state);
    let addr = format!("0.0.0.0:{port}");
    tracing::info!("moon-api listening on {addr}");

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    axum::serve(listener, app).await.context("server error")?;
    Ok(())
}
