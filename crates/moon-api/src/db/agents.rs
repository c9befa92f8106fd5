//! Agent persistence operations on the `agent` table.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::state::AgentRecord;

/// Insert a new agent.
pub async fn insert(pool: &PgPool, record: &AgentRecord) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO agent (agent_id, agent_code, first_name, last_name, email, phone,
         branch_id, created_at, updated_at)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
    )
    .bind(record.agent_id)
    .bind(&record.agent_code)
    .bind(&record.first_name)
    .bind(&record.last_name)
    .bind(&record.email)
    .bind(&record.phone)
    .bind(record.branch_id)
    .bind(record.created_at)
    .bind(record.updated_at)
    .execute(pool)
    .await?;

    Ok(())
}

/// Overwrite every mutable column. Returns `false` if the agent is gone.
pub async fn update(pool: &PgPool, record: &AgentRecord) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE agent SET agent_code = $2, first_name = $3, last_name = $4, email = $5,
         phone = $6, branch_id = $7, updated_at = $8
         WHERE agent_id = $1",
    )
    .bind(record.agent_id)
    .bind(&record.agent_code)
    .bind(&record.first_name)
    .bind(&record.last_name)
    .bind(&record.email)
    .bind(&record.phone)
    .bind(record.branch_id)
    .bind(record.updated_at)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Delete an agent. Returns `false` if nothing was deleted.
pub async fn delete(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM agent WHERE agent_id = $1")
        .bind(id)
        .execute(pool)
        .await?;

    Ok(result.rows_affected() > 0)
}

/// Load every agent for start-up hydration.
pub async fn load_all(pool: &PgPool) -> Result<Vec<AgentRecord>, sqlx::Error> {
    let rows = sqlx::query_as::<_, AgentRow>(
        "SELECT agent_id, agent_code, first_name, last_name, email, phone,
         branch_id, created_at, updated_at
         FROM agent ORDER BY created_at",
    )
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(AgentRow::into_record).collect())
}

#[derive(sqlx::FromRow)]
struct AgentRow {
    agent_id: Uuid,
    agent_code: String,
    first_name: String,
    last_name: String,
    email: String,
    phone: String,
    branch_id: Option<Uuid>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl AgentRow {
    fn into_record(self) -> AgentRecord {
        AgentRecord {
            agent_id: self.agent_id,
            agent_code: self.agent_code,
            first_name: self.first_name,
            last_name: self.last_name,
            email: self.email,
            phone: self.phone,
            branch_id: self.branch_id,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}
