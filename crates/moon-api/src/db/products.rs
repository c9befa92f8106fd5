//! Product persistence operations on the `product` table.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::state::ProductRecord;

/// Insert a new product.
pub async fn insert(pool: &PgPool, record: &ProductRecord) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO product (product_id, name, description, created_at, updated_at)
         VALUES ($1, $2, $3, $4, $5)",
    )
    .bind(record.product_id)
    .bind(&record.name)
    .bind(&record.description)
    .bind(record.created_at)
    .bind(record.updated_at)
    .execute(pool)
    .await?;

    Ok(())
}

/// Overwrite name and description.
pub async fn update(pool: &PgPool, record: &ProductRecord) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE product SET name = $2, description = $3, updated_at = $4 WHERE product_id = $1",
    )
    .bind(record.product_id)
    .bind(&record.name)
    .bind(&record.description)
    .bind(record.updated_at)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Delete a product.
pub async fn delete(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM product WHERE product_id = $1")
        .bind(id)
        .execute(pool)
        .await?;

    Ok(result.rows_affected() > 0)
}

/// Load every product for start-up hydration.
pub async fn load_all(pool: &PgPool) -> Result<Vec<ProductRecord>, sqlx::Error> {
    let rows = sqlx::query_as::<_, ProductRow>(
        "SELECT product_id, name, description, created_at, updated_at
         FROM product ORDER BY created_at",
    )
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(ProductRow::into_record).collect())
}

#[derive(sqlx::FromRow)]
struct ProductRow {
    product_id: Uuid,
    name: String,
    description: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl ProductRow {
    fn into_record(self) -> ProductRecord {
        ProductRecord {
            product_id: self.product_id,
            name: self.name,
            description: self.description,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}
