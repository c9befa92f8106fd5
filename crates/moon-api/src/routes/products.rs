//! # Products API
//!
//! - **POST `/v1/products`**: create a product
//! - **GET `/v1/products`**: list products, oldest first
//! - **GET `/v1/products/{id}`**: fetch one product
//! - **PUT `/v1/products/{id}`**: replace name and description
//! - **DELETE `/v1/products/{id}`**: delete a product

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use chrono::Utc;
use serde::Deserialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::AppError;
use crate::extractors::{extract_validated_json, required_text, Validate};
use crate::state::{AppState, ProductRecord};

const NAME_MAX: usize = 255;

/// Create a product. `product_id` is generated when omitted.
#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateProductRequest {
    pub product_id: Option<Uuid>,
    pub name: String,
    pub description: Option<String>,
}

impl Validate for CreateProductRequest {
    fn validate(&self) -> Result<(), String> {
        required_text("name", &self.name, NAME_MAX)
    }
}

/// Replace a product's name and description.
#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateProductRequest {
    pub name: String,
    pub description: Option<String>,
}

impl Validate for UpdateProductRequest {
    fn validate(&self) -> Result<(), String> {
        required_text("name", &self.name, NAME_MAX)
    }
}

/// Blank descriptions are stored as `NULL`.
fn normalize_description(description: Option<String>) -> Option<String> {
    description
        .map(|d| d.trim().to_string())
        .filter(|d| !d.is_empty())
}

// ── Router ──────────────────────────────────────────────────────────────────

/// Build the products router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/v1/products", get(list_products).post(create_product))
        .route(
            "/v1/products/{id}",
            get(get_product).put(update_product).delete(delete_product),
        )
}

/// POST /v1/products
#[utoipa::path(
    post,
    path = "/v1/products",
    request_body = CreateProductRequest,
    responses(
        (status = 201, description = "Product created", body = ProductRecord),
        (status = 409, description = "product_id already exists", body = crate::error::ErrorBody),
        (status = 422, description = "Validation error", body = crate::error::ErrorBody),
    ),
    tag = "products"
)]
pub(crate) async fn create_product(
    State(state): State<AppState>,
    body: Result<Json<CreateProductRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<ProductRecord>), AppError> {
    let req = extract_validated_json(body)?;
    let now = Utc::now();
    let record = ProductRecord {
        product_id: req.product_id.unwrap_or_else(Uuid::new_v4),
        name: req.name.trim().to_string(),
        description: normalize_description(req.description),
        created_at: now,
        updated_at: now,
    };

    state
        .products
        .insert_unique(record.product_id, record.clone(), |_, _| false)
        .map_err(|_| AppError::Conflict(format!("product {} already exists", record.product_id)))?;

    if let Some(pool) = &state.db_pool {
        if let Err(e) = crate::db::products::insert(pool, &record).await {
            state.products.remove(&record.product_id);
            tracing::error!(product_id = %record.product_id, error = %e, "failed to persist product");
            return Err(AppError::from_db("persist product", e));
        }
    }

    Ok((StatusCode::CREATED, Json(record)))
}

/// GET /v1/products
#[utoipa::path(
    get,
    path = "/v1/products",
    responses(
        (status = 200, description = "All products", body = Vec<ProductRecord>),
    ),
    tag = "products"
)]
pub(crate) async fn list_products(State(state): State<AppState>) -> Json<Vec<ProductRecord>> {
    let mut products = state.products.list();
    products.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.name.cmp(&b.name)));
    Json(products)
}

/// GET /v1/products/{id}
#[utoipa::path(
    get,
    path = "/v1/products/{id}",
    params(("id" = Uuid, Path, description = "Product ID")),
    responses(
        (status = 200, description = "Product found", body = ProductRecord),
        (status = 404, description = "Not found", body = crate::error::ErrorBody),
    ),
    tag = "products"
)]
pub(crate) async fn get_product(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ProductRecord>, AppError> {
    state
        .products
        .get(&id)
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("product {id} not found")))
}

/// PUT /v1/products/{id}
#[utoipa::path(
    put,
    path = "/v1/products/{id}",
    params(("id" = Uuid, Path, description = "Product ID")),
    request_body = UpdateProductRequest,
    responses(
        (status = 200, description = "Product updated", body = ProductRecord),
        (status = 404, description = "Not found", body = crate::error::ErrorBody),
        (status = 422, description = "Validation error", body = crate::error::ErrorBody),
    ),
    tag = "products"
)]
pub(crate) async fn update_product(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    body: Result<Json<UpdateProductRequest>, JsonRejection>,
) -> Result<Json<ProductRecord>, AppError> {
    let req = extract_validated_json(body)?;
    let previous = state
        .products
        .get(&id)
        .ok_or_else(|| AppError::NotFound(format!("product {id} not found")))?;

    let name = req.name.trim().to_string();
    let description = normalize_description(req.description);
    let updated = state
        .products
        .update(&id, |record| {
            record.name = name;
            record.description = description;
            record.updated_at = Utc::now();
        })
        .ok_or_else(|| AppError::NotFound(format!("product {id} not found")))?;

    if let Some(pool) = &state.db_pool {
        if let Err(e) = crate::db::products::update(pool, &updated).await {
            state.products.insert(id, previous);
            tracing::error!(product_id = %id, error = %e, "failed to persist product update");
            return Err(AppError::from_db("update product", e));
        }
    }

    Ok(Json(updated))
}

/// DELETE /v1/products/{id}
#[utoipa::path(
    delete,
    path = "/v1/products/{id}",
    params(("id" = Uuid, Path, description = "Product ID")),
    responses(
        (status = 204, description = "Product deleted"),
        (status = 404, description = "Not found", body = crate::error::ErrorBody),
    ),
    tag = "products"
)]
pub(crate) async fn delete_product(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    let removed = state
        .products
        .remove(&id)
        .ok_or_else(|| AppError::NotFound(format!("product {id} not found")))?;

    if let Some(pool) = &state.db_pool {
        if let Err(e) = crate::db::products::delete(pool, id).await {
            state.products.insert(id, removed);
            tracing::error!(product_id = %id, error = %e, "failed to delete product");
            return Err(AppError::from_db("delete product", e));
        }
    }

    Ok(StatusCode::NO_CONTENT)
}
