//! # Agents API
//!
//! - **POST `/v1/agents`**: create an agent
//! - **GET `/v1/agents`**: list agents, oldest first
//! - **GET `/v1/agents/{id}`**: fetch one agent
//! - **PUT `/v1/agents/{id}`**: replace an agent's mutable fields
//! - **DELETE `/v1/agents/{id}`**: delete an agent
//!
//! `agent_code` and `email` (case-insensitive) are unique; a clash is 409.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use chrono::Utc;
use moon_core::{EmailAddress, PhoneNumber};
use serde::Deserialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::AppError;
use crate::extractors::{extract_validated_json, required_text, Validate};
use crate::state::{AgentRecord, AppState};

const CODE_MAX: usize = 50;
const NAME_MAX: usize = 100;

// ── Request DTOs ────────────────────────────────────────────────────────────

/// Create an agent. `agent_id` is generated when omitted.
#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateAgentRequest {
    pub agent_id: Option<Uuid>,
    pub agent_code: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
    pub branch_id: Option<Uuid>,
}

/// Replace every mutable field of an agent.
#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateAgentRequest {
    pub agent_code: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
    pub branch_id: Option<Uuid>,
}

fn validate_fields(
    agent_code: &str,
    first_name: &str,
    last_name: &str,
    email: &str,
    phone: &str,
) -> Result<(), String> {
    required_text("agent_code", agent_code, CODE_MAX)?;
    required_text("first_name", first_name, NAME_MAX)?;
    required_text("last_name", last_name, NAME_MAX)?;
    EmailAddress::new(email).map_err(|e| e.to_string())?;
    PhoneNumber::new(phone).map_err(|e| e.to_string())?;
    Ok(())
}

impl Validate for CreateAgentRequest {
    fn validate(&self) -> Result<(), String> {
        validate_fields(
            &self.agent_code,
            &self.first_name,
            &self.last_name,
            &self.email,
            &self.phone,
        )
    }
}

impl Validate for UpdateAgentRequest {
    fn validate(&self) -> Result<(), String> {
        validate_fields(
            &self.agent_code,
            &self.first_name,
            &self.last_name,
            &self.email,
            &self.phone,
        )
    }
}

impl UpdateAgentRequest {
    fn apply(self, record: &mut AgentRecord) -> Result<(), AppError> {
        record.agent_code = self.agent_code.trim().to_string();
        record.first_name = self.first_name.trim().to_string();
        record.last_name = self.last_name.trim().to_string();
        record.email = EmailAddress::new(&self.email)?.to_string();
        record.phone = PhoneNumber::new(&self.phone)?.as_str().to_string();
        record.branch_id = self.branch_id;
        record.updated_at = Utc::now();
        Ok(())
    }
}

fn conflict(candidate: &AgentRecord, existing: &AgentRecord) -> AppError {
    let message = if existing.agent_id == candidate.agent_id {
        format!("agent {} already exists", candidate.agent_id)
    } else if existing.agent_code == candidate.agent_code {
        format!("agent_code {} is already in use", candidate.agent_code)
    } else {
        format!("email {} is already in use", candidate.email)
    };
    AppError::Conflict(message)
}

// ── Router ──────────────────────────────────────────────────────────────────

/// Build the agents router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/v1/agents", get(list_agents).post(create_agent))
        .route(
            "/v1/agents/{id}",
            get(get_agent).put(update_agent).delete(delete_agent),
        )
}

// ── Handlers ────────────────────────────────────────────────────────────────

/// POST /v1/agents
#[utoipa::path(
    post,
    path = "/v1/agents",
    request_body = CreateAgentRequest,
    responses(
        (status = 201, description = "Agent created", body = AgentRecord),
        (status = 409, description = "agent_code or email already in use", body = crate::error::ErrorBody),
        (status = 422, description = "Validation error", body = crate::error::ErrorBody),
    ),
    tag = "agents"
)]
pub(crate) async fn create_agent(
    State(state): State<AppState>,
    body: Result<Json<CreateAgentRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<AgentRecord>), AppError> {
    let req = extract_validated_json(body)?;
    let now = Utc::now();
    let record = AgentRecord {
        agent_id: req.agent_id.unwrap_or_else(Uuid::new_v4),
        agent_code: req.agent_code.trim().to_string(),
        first_name: req.first_name.trim().to_string(),
        last_name: req.last_name.trim().to_string(),
        email: EmailAddress::new(&req.email)?.to_string(),
        phone: PhoneNumber::new(&req.phone)?.as_str().to_string(),
        branch_id: req.branch_id,
        created_at: now,
        updated_at: now,
    };

    state
        .agents
        .insert_unique(record.agent_id, record.clone(), AgentRecord::clashes_with)
        .map_err(|existing| conflict(&record, &existing))?;

    if let Some(pool) = &state.db_pool {
        if let Err(e) = crate::db::agents::insert(pool, &record).await {
            state.agents.remove(&record.agent_id);
            tracing::error!(agent_id = %record.agent_id, error = %e, "failed to persist agent");
            return Err(AppError::from_db("persist agent", e));
        }
    }

    tracing::info!(agent_id = %record.agent_id, agent_code = %record.agent_code, "agent created");
    Ok((StatusCode::CREATED, Json(record)))
}

/// GET /v1/agents
#[utoipa::path(
    get,
    path = "/v1/agents",
    responses(
        (status = 200, description = "All agents", body = Vec<AgentRecord>),
    ),
    tag = "agents"
)]
pub(crate) async fn list_agents(State(state): State<AppState>) -> Json<Vec<AgentRecord>> {
    let mut agents = state.agents.list();
    agents.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.agent_code.cmp(&b.agent_code)));
    Json(agents)
}

/// GET /v1/agents/{id}
#[utoipa::path(
    get,
    path = "/v1/agents/{id}",
    params(("id" = Uuid, Path, description = "Agent ID")),
    responses(
        (status = 200, description = "Agent found", body = AgentRecord),
        (status = 404, description = "Not found", body = crate::error::ErrorBody),
    ),
    tag = "agents"
)]
pub(crate) async fn get_agent(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<AgentRecord>, AppError> {
    state
        .agents
        .get(&id)
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("agent {id} not found")))
}

/// PUT /v1/agents/{id}
#[utoipa::path(
    put,
    path = "/v1/agents/{id}",
    params(("id" = Uuid, Path, description = "Agent ID")),
    request_body = UpdateAgentRequest,
    responses(
        (status = 200, description = "Agent updated", body = AgentRecord),
        (status = 404, description = "Not found", body = crate::error::ErrorBody),
        (status = 409, description = "agent_code or email already in use", body = crate::error::ErrorBody),
        (status = 422, description = "Validation error", body = crate::error::ErrorBody),
    ),
    tag = "agents"
)]
pub(crate) async fn update_agent(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    body: Result<Json<UpdateAgentRequest>, JsonRejection>,
) -> Result<Json<AgentRecord>, AppError> {
    let req = extract_validated_json(body)?;
    let previous = state
        .agents
        .get(&id)
        .ok_or_else(|| AppError::NotFound(format!("agent {id} not found")))?;

    let mut candidate = previous.clone();
    req.apply(&mut candidate)?;

    let updated = match state.agents.update_unique(
        &id,
        |record| *record = candidate.clone(),
        AgentRecord::clashes_with,
    ) {
        None => return Err(AppError::NotFound(format!("agent {id} not found"))),
        Some(Err(existing)) => return Err(conflict(&candidate, &existing)),
        Some(Ok(updated)) => updated,
    };

    if let Some(pool) = &state.db_pool {
        match crate::db::agents::update(pool, &updated).await {
            Ok(true) => {}
            Ok(false) => {
                tracing::warn!(agent_id = %id, "agent updated in memory but missing from database");
            }
            Err(e) => {
                state.agents.insert(id, previous);
                tracing::error!(agent_id = %id, error = %e, "failed to persist agent update");
                return Err(AppError::from_db("update agent", e));
            }
        }
    }

    Ok(Json(updated))
}

/// DELETE /v1/agents/{id}
#[utoipa::path(
    delete,
    path = "/v1/agents/{id}",
    params(("id" = Uuid, Path, description = "Agent ID")),
    responses(
        (status = 204, description = "Agent deleted"),
        (status = 404, description = "Not found", body = crate::error::ErrorBody),
    ),
    tag = "agents"
)]
pub(crate) async fn delete_agent(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    let removed = state
        .agents
        .remove(&id)
        .ok_or_else(|| AppError::NotFound(format!("agent {id} not found")))?;

    if let Some(pool) = &state.db_pool {
        if let Err(e) = crate::db::agents::delete(pool, id).await {
            state.agents.insert(id, removed);
            tracing::error!(agent_id = %id, error = %e, "failed to delete agent");
            return Err(AppError::from_db("delete agent", e));
        }
    }

    tracing::info!(agent_id = %id, "agent deleted");
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create(code: &str, email: &str) -> CreateAgentRequest {
        CreateAgentRequest {
            agent_id: None,
            agent_code: code.into(),
            first_name: "Nimal".into(),
            last_name: "Perera".into(),
            email: email.into(),
            phone: "077 123 4567".into(),
            branch_id: None,
        }
    }

    #[test]
    fn create_request_validates() {
        assert!(create("AG-1", "nimal@moon.lk").validate().is_ok());
    }

    #[test]
    fn create_request_rejects_bad_email() {
        let err = create("AG-1", "nimal.moon.lk").validate().unwrap_err();
        assert!(err.contains("invalid email"));
    }

    #[test]
    fn create_request_rejects_long_code() {
        let err = create(&"X".repeat(51), "nimal@moon.lk").validate().unwrap_err();
        assert!(err.contains("agent_code"));
    }

    #[test]
    fn update_apply_trims_fields() {
        let now = Utc::now();
        let mut record = AgentRecord {
            agent_id: Uuid::new_v4(),
            agent_code: "AG-1".into(),
            first_name: "Nimal".into(),
            last_name: "Perera".into(),
            email: "nimal@moon.lk".into(),
            phone: "0771234567".into(),
            branch_id: None,
            created_at: now,
            updated_at: now,
        };
        let req = UpdateAgentRequest {
            agent_code: " AG-9 ".into(),
            first_name: " Kamal ".into(),
            last_name: "Silva".into(),
            email: " kamal@moon.lk ".into(),
            phone: "0777654321".into(),
            branch_id: None,
        };
        req.apply(&mut record).unwrap();
        assert_eq!(record.agent_code, "AG-9");
        assert_eq!(record.first_name, "Kamal");
        assert_eq!(record.email, "kamal@moon.lk");
        assert_eq!(record.created_at, now);
    }
}
