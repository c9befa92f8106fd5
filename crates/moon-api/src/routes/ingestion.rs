//! # Ingestion Trigger
//!
//! - **POST `/v1/ingestion/trigger`**: ingest every unprocessed CSV file
//!   under a bucket prefix
//!
//! Runs are serialized per process. Answers 503 when the service was
//! started without ingestion configured.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use moon_ingest::{BatchReport, IngestRequest};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::error::AppError;
use crate::extractors::extract_json;
use crate::middleware::metrics::{INGESTED_FILES_TOTAL, INGESTED_ROWS_TOTAL};
use crate::state::AppState;

/// Which bucket prefix to ingest.
#[derive(Debug, Deserialize, ToSchema)]
pub struct TriggerIngestionRequest {
    pub bucket_name: String,
    /// Prefix inside the bucket.
    pub file_path: String,
    /// Prefix processed files are moved under.
    #[serde(default)]
    pub archive_path: Option<String>,
}

/// Successful ingestion run.
#[derive(Debug, Serialize, ToSchema)]
pub struct TriggerIngestionResponse {
    pub message: String,
    /// Always `"success"`.
    pub ingestion: String,
    #[schema(value_type = Object)]
    pub report: BatchReport,
}

/// Build the ingestion router.
pub fn router() -> Router<AppState> {
    Router::new().route("/v1/ingestion/trigger", post(trigger_ingestion))
}

/// POST /v1/ingestion/trigger
#[utoipa::path(
    post,
    path = "/v1/ingestion/trigger",
    request_body = TriggerIngestionRequest,
    responses(
        (status = 200, description = "Files ingested", body = TriggerIngestionResponse),
        (status = 404, description = "No files under the prefix", body = crate::error::ErrorBody),
        (status = 422, description = "Validation error", body = crate::error::ErrorBody),
        (status = 503, description = "Ingestion not configured", body = crate::error::ErrorBody),
    ),
    tag = "ingestion"
)]
pub(crate) async fn trigger_ingestion(
    State(state): State<AppState>,
    body: Result<Json<TriggerIngestionRequest>, JsonRejection>,
) -> Result<Json<TriggerIngestionResponse>, AppError> {
    let req = extract_json(body)?;
    let request =
        IngestRequest::new(req.bucket_name, req.file_path)?.with_archive_path(req.archive_path);

    let trigger = state
        .ingestion
        .as_ref()
        .ok_or_else(|| AppError::ServiceUnavailable("ingestion is not configured".into()))?;

    let _running = trigger.run_lock.lock().await;
    tracing::info!(
        bucket = %request.bucket_name,
        prefix = %request.file_path,
        "ingestion triggered"
    );
    let report = trigger.service.run(&request).await?;

    metrics::counter!(INGESTED_FILES_TOTAL).increment(report.ingested as u64);
    metrics::counter!(INGESTED_ROWS_TOTAL).increment(report.rows_loaded);

    Ok(Json(TriggerIngestionResponse {
        message: "Sales data ingested successfully.".to_string(),
        ingestion: "success".to_string(),
        report,
    }))
}
