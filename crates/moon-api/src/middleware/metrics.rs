//! # Request Metrics
//!
//! Records request counts, latency, and errors through the `metrics` facade.
//! Whatever recorder is installed receives them; `main` installs the
//! Prometheus exporter and the handle is rendered at `/metrics`.
//!
//! Paths are labelled by their route template (`/v1/agents/{id}`), not the
//! concrete URI, to keep label cardinality bounded.

use std::time::Instant;

use axum::extract::{MatchedPath, Request, State};
use axum::http::{header, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use crate::state::AppState;

pub const HTTP_REQUESTS_TOTAL: &str = "moon_http_requests_total";
pub const HTTP_REQUEST_DURATION_SECONDS: &str = "moon_http_request_duration_seconds";
pub const HTTP_ERRORS_TOTAL: &str = "moon_http_errors_total";
pub const INGESTED_FILES_TOTAL: &str = "moon_ingested_files_total";
pub const INGESTED_ROWS_TOTAL: &str = "moon_ingested_rows_total";

/// Count and time every request.
pub async fn metrics_middleware(request: Request, next: Next) -> Response {
    let method = request.method().to_string();
    let path = request
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_string())
        .unwrap_or_else(|| "unmatched".to_string());
    let start = Instant::now();

    let response = next.run(request).await;

    let status = response.status();
    metrics::counter!(
        HTTP_REQUESTS_TOTAL,
        "method" => method.clone(),
        "path" => path.clone(),
        "status" => status.as_u16().to_string()
    )
    .increment(1);
    metrics::histogram!(
        HTTP_REQUEST_DURATION_SECONDS,
        "method" => method.clone(),
        "path" => path.clone()
    )
    .record(start.elapsed().as_secs_f64());
    if status.is_client_error() || status.is_server_error() {
        metrics::counter!(
            HTTP_ERRORS_TOTAL,
            "method" => method,
            "path" => path,
            "status" => status.as_u16().to_string()
        )
        .increment(1);
    }

    response
}

/// `GET /metrics`: Prometheus text exposition, or 404 with no exporter.
pub async fn render(State(state): State<AppState>) -> Response {
    match &state.metrics {
        Some(handle) => (
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            handle.render(),
        )
            .into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::middleware::from_fn;
    use axum::routing::get;
    use axum::Router;
    use metrics_exporter_prometheus::PrometheusBuilder;
    use tower::ServiceExt;

    #[test]
    fn records_request_with_route_template() {
        let recorder = PrometheusBuilder::new().build_recorder();
        let handle = recorder.handle();

        let app = Router::new()
            .route("/things/{id}", get(|| async { "ok" }))
            .layer(from_fn(metrics_middleware));
        let request = axum::http::Request::builder()
            .uri("/things/42")
            .body(Body::empty())
            .unwrap();

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        let response = metrics::with_local_recorder(&recorder, || {
            runtime.block_on(app.oneshot(request)).unwrap()
        });
        assert_eq!(response.status(), StatusCode::OK);

        let rendered = handle.render();
        assert!(rendered.contains(HTTP_REQUESTS_TOTAL));
        assert!(rendered.contains("path=\"/things/{id}\""));
        assert!(!rendered.contains(HTTP_ERRORS_TOTAL));
    }
}
