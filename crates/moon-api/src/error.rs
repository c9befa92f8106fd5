//! # API Error Types
//!
//! [`AppError`] maps domain failures to HTTP status codes and a uniform JSON
//! body. Internal details are logged, never returned.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use moon_ingest::IngestError;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

/// Structured JSON error response body.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

/// Inner error detail.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorDetail {
    /// Machine-readable error code (e.g., "NOT_FOUND", "VALIDATION_ERROR").
    pub code: String,
    /// Human-readable error message.
    pub message: String,
    /// Additional context for client errors.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

/// Application-level error type.
#[derive(Error, Debug)]
pub enum AppError {
    /// Resource not found (404).
    #[error("not found: {0}")]
    NotFound(String),

    /// Request content failed validation (422).
    #[error("validation error: {0}")]
    Validation(String),

    /// Request body could not be parsed (422).
    #[error("bad request: {0}")]
    BadRequest(String),

    /// Missing or invalid bearer token (401).
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Uniqueness clash with an existing record (409).
    #[error("conflict: {0}")]
    Conflict(String),

    /// Internal server error (500). Message is logged but not returned to client.
    #[error("internal error: {0}")]
    Internal(String),

    /// A dependency is not configured (503).
    #[error("service unavailable: {0}")]
    ServiceUnavailable(String),
}

impl AppError {
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            Self::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            Self::Validation(_) => (StatusCode::UNPROCESSABLE_ENTITY, "VALIDATION_ERROR"),
            Self::BadRequest(_) => (StatusCode::UNPROCESSABLE_ENTITY, "BAD_REQUEST"),
            Self::Unauthorized(_) => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED"),
            Self::Conflict(_) => (StatusCode::CONFLICT, "CONFLICT"),
            Self::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
            Self::ServiceUnavailable(_) => (StatusCode::SERVICE_UNAVAILABLE, "SERVICE_UNAVAILABLE"),
        }
    }

    /// Map a database write failure, treating unique violations as conflicts.
    pub fn from_db(context: &str, err: sqlx::Error) -> Self {
        let unique = err
            .as_database_error()
            .is_some_and(|db| db.is_unique_violation());
        if unique {
            Self::Conflict(format!("{context}: record already exists"))
        } else {
            Self::Internal(format!("{context}: {err}"))
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();

        let message = match &self {
            Self::Internal(_) => "An internal error occurred".to_string(),
            other => other.to_string(),
        };

        match &self {
            Self::Internal(_) => tracing::error!(error = %self, "internal server error"),
            Self::ServiceUnavailable(_) => tracing::warn!(error = %self, "service unavailable"),
            _ => {}
        }

        let body = ErrorBody {
            error: ErrorDetail {
                code: code.to_string(),
                message,
                details: None,
            },
        };

        (status, Json(body)).into_response()
    }
}

impl From<moon_core::ValidationError> for AppError {
    fn from(err: moon_core::ValidationError) -> Self {
        Self::Validation(err.to_string())
    }
}

/// An empty listing is the caller's problem; everything else is ours.
impl From<IngestError> for AppError {
    fn from(err: IngestError) -> Self {
        match err.root() {
            IngestError::NoFiles { .. } => Self::NotFound(err.to_string()),
            IngestError::InvalidRequest(_) => Self::Validation(err.to_string()),
            _ => Self::Internal(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;

    async fn response_parts(err: AppError) -> (StatusCode, ErrorBody) {
        let response = err.into_response();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body: ErrorBody = serde_json::from_slice(&bytes).unwrap();
        (status, body)
    }

    #[test]
    fn status_codes() {
        let cases = [
            (AppError::NotFound("x".into()), StatusCode::NOT_FOUND, "NOT_FOUND"),
            (AppError::Validation("x".into()), StatusCode::UNPROCESSABLE_ENTITY, "VALIDATION_ERROR"),
            (AppError::BadRequest("x".into()), StatusCode::UNPROCESSABLE_ENTITY, "BAD_REQUEST"),
            (AppError::Unauthorized("x".into()), StatusCode::UNAUTHORIZED, "UNAUTHORIZED"),
            (AppError::Conflict("x".into()), StatusCode::CONFLICT, "CONFLICT"),
            (AppError::Internal("x".into()), StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
            (
                AppError::ServiceUnavailable("x".into()),
                StatusCode::SERVICE_UNAVAILABLE,
                "SERVICE_UNAVAILABLE",
            ),
        ];
        for (err, status, code) in cases {
            assert_eq!(err.status_and_code(), (status, code));
        }
    }

    #[test]
    fn validation_error_converts() {
        let err = AppError::from(moon_core::ValidationError::Empty { field: "first_name" });
        assert!(matches!(err, AppError::Validation(ref m) if m.contains("first_name")));
    }

    #[test]
    fn no_files_maps_to_not_found() {
        let err = AppError::from(IngestError::NoFiles {
            bucket: "sales".into(),
            prefix: "2024/".into(),
        });
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[test]
    fn wrapped_store_failure_maps_to_internal() {
        let err = AppError::from(IngestError::File {
            key: "2024/a.csv".into(),
            source: Box::new(IngestError::Store(moon_ingest::StoreError::Duplicate(
                "abc".into(),
            ))),
        });
        assert!(matches!(err, AppError::Internal(_)));
    }

    #[test]
    fn non_database_sqlx_error_is_internal() {
        let err = AppError::from_db("insert agent", sqlx::Error::PoolTimedOut);
        assert!(matches!(err, AppError::Internal(_)));
    }

    #[tokio::test]
    async fn into_response_hides_internal_message() {
        let (status, body) =
            response_parts(AppError::Internal("password=hunter2".into())).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body.error.message, "An internal error occurred");
    }

    #[tokio::test]
    async fn into_response_conflict_keeps_message() {
        let (status, body) = response_parts(AppError::Conflict("agent_code AG-1".into())).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body.error.code, "CONFLICT");
        assert!(body.error.message.contains("AG-1"));
        assert!(body.error.details.is_none());
    }
}
