//! # OpenAPI Document
//!
//! Collects the utoipa-annotated handlers into one OpenAPI 3.1 document,
//! served at `/openapi.json`.

use axum::routing::get;
use axum::{Json, Router};
use utoipa::OpenApi;

use crate::state::AppState;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Moon Agent Tracker API",
        version = "0.1.0",
        description = "Agents, products, and on-demand sales ingestion."
    ),
    paths(
        crate::routes::agents::create_agent,
        crate::routes::agents::list_agents,
        crate::routes::agents::get_agent,
        crate::routes::agents::update_agent,
        crate::routes::agents::delete_agent,
        crate::routes::products::create_product,
        crate::routes::products::list_products,
        crate::routes::products::get_product,
        crate::routes::products::update_product,
        crate::routes::products::delete_product,
        crate::routes::ingestion::trigger_ingestion,
    ),
    components(schemas(
        crate::error::ErrorBody,
        crate::error::ErrorDetail,
        crate::state::AgentRecord,
        crate::state::ProductRecord,
        crate::routes::agents::CreateAgentRequest,
        crate::routes::agents::UpdateAgentRequest,
        crate::routes::products::CreateProductRequest,
        crate::routes::products::UpdateProductRequest,
        crate::routes::ingestion::TriggerIngestionRequest,
        crate::routes::ingestion::TriggerIngestionResponse,
    )),
    tags(
        (name = "agents", description = "Sales agents"),
        (name = "products", description = "Products agents may sell"),
        (name = "ingestion", description = "Sales file ingestion from object storage"),
    )
)]
pub struct ApiDoc;

/// Serve the document at `/openapi.json`.
pub fn router() -> Router<AppState> {
    Router::new().route("/openapi.json", get(openapi_json))
}

async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}
