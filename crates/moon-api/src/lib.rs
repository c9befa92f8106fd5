//! # moon-api: Agent Tracker HTTP Service
//!
//! CRUD over agents and products, plus an endpoint that triggers sales
//! ingestion from object storage.
//!
//! ## API Surface
//!
//! | Prefix                   | Module                  |
//! |--------------------------|-------------------------|
//! | `/v1/agents/*`           | [`routes::agents`]      |
//! | `/v1/products/*`         | [`routes::products`]    |
//! | `/v1/ingestion/trigger`  | [`routes::ingestion`]   |
//! | `/openapi.json`          | [`openapi`]             |
//!
//! `/health/liveness`, `/health/readiness`, and `/metrics` are served
//! without authentication.
//!
//! ## Middleware Stack (execution order)
//!
//! ```text
//! Cors → TraceLayer → MetricsMiddleware → AuthMiddleware → Handler
//! ```

pub mod auth;
pub mod db;
pub mod error;
pub mod extractors;
pub mod middleware;
pub mod openapi;
pub mod routes;
pub mod state;

use axum::extract::State;
use axum::http::StatusCode;
use axum::middleware::from_fn;
use axum::routing::get;
use axum::Router;
use tower_http::cors::CorsLayer;

use crate::auth::AuthConfig;
use crate::state::AppState;

/// Assemble the application router with all routes and middleware.
pub fn app(state: AppState) -> Router {
    let auth_config = AuthConfig {
        token: state.config.auth_token.clone(),
    };

    let api = Router::new()
        .merge(routes::agents::router())
        .merge(routes::products::router())
        .merge(routes::ingestion::router())
        .merge(openapi::router())
        .layer(from_fn(auth::auth_middleware))
        .layer(from_fn(middleware::metrics::metrics_middleware))
        .layer(middleware::tracing_layer::layer())
        .layer(axum::Extension(auth_config));

    let open = Router::new()
        .route("/health/liveness", get(liveness))
        .route("/health/readiness", get(readiness))
        .route("/metrics", get(middleware::metrics::render));

    Router::new()
        .merge(open)
        .merge(api)
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn liveness() -> &'static str {
    "ok"
}

/// Ready once the database, if configured, answers a ping.
async fn readiness(State(state): State<AppState>) -> (StatusCode, &'static str) {
    if let Some(pool) = &state.db_pool {
        if let Err(e) = sqlx::query("SELECT 1").execute(pool).await {
            tracing::warn!(error = %e, "readiness check failed: database unreachable");
            return (StatusCode::SERVICE_UNAVAILABLE, "database unavailable");
        }
    }
    (StatusCode::OK, "ready")
}
