//! # Application State
//!
//! Shared state for the Axum application, passed to all route handlers
//! via the `State` extractor.
//!
//! Agents and products are served from in-memory stores. When a database
//! pool is configured, writes go through to Postgres and the stores are
//! hydrated from it on start-up.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use metrics_exporter_prometheus::PrometheusHandle;
use moon_ingest::IngestionService;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use utoipa::ToSchema;
use uuid::Uuid;

// -- Generic In-Memory Store --------------------------------------------------

/// Thread-safe, cloneable in-memory key-value store.
///
/// The lock is `parking_lot` and is never held across `.await`.
#[derive(Debug)]
pub struct Store<T: Clone + Send + Sync> {
    data: Arc<RwLock<HashMap<Uuid, T>>>,
}

impl<T: Clone + Send + Sync> Clone for Store<T> {
    fn clone(&self) -> Self {
        Self {
            data: Arc::clone(&self.data),
        }
    }
}

impl<T: Clone + Send + Sync> Store<T> {
    /// Create an empty store.
    pub fn new() -> Self {
        Self {
            data: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Insert a record, returning the previous value if the key existed.
    pub fn insert(&self, id: Uuid, value: T) -> Option<T> {
        self.data.write().insert(id, value)
    }

    /// Insert a new record unless `id` is taken or an existing record
    /// `conflicts` with it. On rejection the clashing record is returned.
    ///
    /// The check and the insert happen under one write lock.
    pub fn insert_unique(
        &self,
        id: Uuid,
        value: T,
        conflicts: impl Fn(&T, &T) -> bool,
    ) -> Result<(), T> {
        let mut guard = self.data.write();
        if let Some(existing) = guard.get(&id) {
            return Err(existing.clone());
        }
        if let Some(existing) = guard.values().find(|existing| conflicts(existing, &value)) {
            return Err(existing.clone());
        }
        guard.insert(id, value);
        Ok(())
    }

    /// Retrieve a record by ID.
    pub fn get(&self, id: &Uuid) -> Option<T> {
        self.data.read().get(id).cloned()
    }

    /// List all records.
    pub fn list(&self) -> Vec<T> {
        self.data.read().values().cloned().collect()
    }

    /// Update a record in place. Returns the updated record, or `None` if not found.
    pub fn update(&self, id: &Uuid, f: impl FnOnce(&mut T)) -> Option<T> {
        let mut guard = self.data.write();
        if let Some(entry) = guard.get_mut(id) {
            f(entry);
            Some(entry.clone())
        } else {
            None
        }
    }

    /// Apply `f` to a copy of the record and store it unless another record
    /// `conflicts` with the result.
    ///
    /// Returns `None` if the record doesn't exist, `Some(Ok(updated))` on
    /// success, or `Some(Err(clashing))`.
    pub fn update_unique(
        &self,
        id: &Uuid,
        f: impl FnOnce(&mut T),
        conflicts: impl Fn(&T, &T) -> bool,
    ) -> Option<Result<T, T>> {
        let mut guard = self.data.write();
        let mut candidate = guard.get(id)?.clone();
        f(&mut candidate);

        let clash = guard
            .iter()
            .find(|(key, existing)| *key != id && conflicts(existing, &candidate))
            .map(|(_, existing)| existing.clone());
        if let Some(existing) = clash {
            return Some(Err(existing));
        }
        guard.insert(*id, candidate.clone());
        Some(Ok(candidate))
    }

    /// Remove a record by ID.
    pub fn remove(&self, id: &Uuid) -> Option<T> {
        self.data.write().remove(id)
    }

    /// Return the number of records.
    pub fn len(&self) -> usize {
        self.data.read().len()
    }

    /// Whether the store is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T: Clone + Send + Sync> Default for Store<T> {
    fn default() -> Self {
        Self::new()
    }
}

// -- Record Types -------------------------------------------------------------

/// Sales agent record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct AgentRecord {
    pub agent_id: Uuid,
    /// Business identifier, unique across agents.
    pub agent_code: String,
    pub first_name: String,
    pub last_name: String,
    /// Unique across agents.
    pub email: String,
    pub phone: String,
    pub branch_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl AgentRecord {
    /// Whether `other` would violate the `agent_code` or `email` uniqueness of `self`.
    pub fn clashes_with(&self, other: &AgentRecord) -> bool {
        self.agent_code == other.agent_code || self.email.eq_ignore_ascii_case(&other.email)
    }
}

/// Product record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ProductRecord {
    pub product_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// -- Ingestion ----------------------------------------------------------------

/// The ingestion service plus the lock that serializes runs.
///
/// Two overlapping runs over the same prefix could both see a file as
/// unprocessed, so the API admits one run at a time.
#[derive(Debug)]
pub struct IngestionTrigger {
    pub service: IngestionService,
    pub run_lock: tokio::sync::Mutex<()>,
}

impl IngestionTrigger {
    /// Wrap a configured service.
    pub fn new(service: IngestionService) -> Self {
        Self {
            service,
            run_lock: tokio::sync::Mutex::new(()),
        }
    }
}

// -- Application State --------------------------------------------------------

/// Application configuration.
///
/// Custom `Debug` redacts the `auth_token` to prevent credential leakage in logs.
#[derive(Clone)]
pub struct AppConfig {
    /// Port to bind the HTTP server to.
    pub port: u16,
    /// Static bearer token. If `None`, authentication is disabled.
    pub auth_token: Option<String>,
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("port", &self.port)
            .field(
                "auth_token",
                &self.auth_token.as_ref().map(|_| "[REDACTED]"),
            )
            .finish()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            auth_token: None,
        }
    }
}

impl AppConfig {
    /// Load from `PORT` (default 8080) and `AUTH_TOKEN` (optional).
    pub fn from_env() -> Self {
        let port = moon_db::env_lookup("PORT")
            .and_then(|p| p.parse().ok())
            .unwrap_or(8080);
        Self {
            port,
            auth_token: moon_db::env_lookup("AUTH_TOKEN"),
        }
    }
}

/// Shared application state accessible to all route handlers.
#[derive(Debug, Clone)]
pub struct AppState {
    pub agents: Store<AgentRecord>,
    pub products: Store<ProductRecord>,

    /// PostgreSQL pool for write-through persistence. `None` means
    /// in-memory only.
    pub db_pool: Option<PgPool>,

    /// Ingestion trigger. `None` makes the trigger endpoint answer 503.
    pub ingestion: Option<Arc<IngestionTrigger>>,

    /// Prometheus exposition handle for `/metrics`.
    pub metrics: Option<PrometheusHandle>,

    pub config: AppConfig,
}

impl AppState {
    /// In-memory state with default configuration and no ingestion.
    pub fn new() -> Self {
        Self::with_config(AppConfig::default())
    }

    /// In-memory state with the given configuration.
    pub fn with_config(config: AppConfig) -> Self {
        Self {
            agents: Store::new(),
            products: Store::new(),
            db_pool: None,
            ingestion: None,
            metrics: None,
            config,
        }
    }

    /// Attach a database pool.
    pub fn with_db(mut self, pool: Option<PgPool>) -> Self {
        self.db_pool = pool;
        self
    }

    /// Attach the ingestion service.
    pub fn with_ingestion(mut self, service: IngestionService) -> Self {
        self.ingestion = Some(Arc::new(IngestionTrigger::new(service)));
        self
    }

    /// Attach a Prometheus handle.
    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics = Some(handle);
        self
    }

    /// Load agents and products from the database into the in-memory stores.
    ///
    /// No-op without a pool.
    pub async fn hydrate_from_db(&self) -> Result<(), String> {
        let pool = match &self.db_pool {
            Some(pool) => pool,
            None => return Ok(()),
        };

        let agents = crate::db::agents::load_all(pool)
            .await
            .map_err(|e| format!("failed to load agents: {e}"))?;
        for record in agents {
            self.agents.insert(record.agent_id, record);
        }
        let agent_count = self.agents.len();

        let products = crate::db::products::load_all(pool)
            .await
            .map_err(|e| format!("failed to load products: {e}"))?;
        for record in products {
            self.products.insert(record.product_id, record);
        }
        let product_count = self.products.len();

        tracing::info!(
            agents = agent_count,
            products = product_count,
            "hydrated in-memory stores from database"
        );
        Ok(())
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn agent(code: &str, email: &str) -> AgentRecord {
        let now = Utc::now();
        AgentRecord {
            agent_id: Uuid::new_v4(),
            agent_code: code.to_string(),
            first_name: "Nimal".to_string(),
            last_name: "Perera".to_string(),
            email: email.to_string(),
            phone: "+94 77 123 4567".to_string(),
            branch_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn store_insert_and_get() {
        let store: Store<String> = Store::new();
        let id = Uuid::new_v4();
        assert!(store.insert(id, "a".into()).is_none());
        assert_eq!(store.get(&id), Some("a".to_string()));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn store_update_missing_returns_none() {
        let store: Store<String> = Store::new();
        assert!(store.update(&Uuid::new_v4(), |s| s.push('x')).is_none());
    }

    #[test]
    fn store_remove() {
        let store: Store<String> = Store::new();
        let id = Uuid::new_v4();
        store.insert(id, "a".into());
        assert_eq!(store.remove(&id), Some("a".to_string()));
        assert!(store.is_empty());
    }

    #[test]
    fn insert_unique_rejects_clashing_agent() {
        let store = Store::new();
        let first = agent("AG-1", "nimal@moon.lk");
        store
            .insert_unique(first.agent_id, first.clone(), AgentRecord::clashes_with)
            .unwrap();

        let same_email = agent("AG-2", "NIMAL@moon.lk");
        let err = store
            .insert_unique(same_email.agent_id, same_email, AgentRecord::clashes_with)
            .unwrap_err();
        assert_eq!(err.agent_id, first.agent_id);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn update_unique_ignores_the_record_itself() {
        let store = Store::new();
        let a = agent("AG-1", "a@moon.lk");
        store.insert(a.agent_id, a.clone());

        let updated = store
            .update_unique(&a.agent_id, |r| r.first_name = "Kamal".into(), AgentRecord::clashes_with)
            .unwrap()
            .unwrap();
        assert_eq!(updated.first_name, "Kamal");
    }

    #[test]
    fn update_unique_rejects_taking_another_code() {
        let store = Store::new();
        let a = agent("AG-1", "a@moon.lk");
        let b = agent("AG-2", "b@moon.lk");
        store.insert(a.agent_id, a.clone());
        store.insert(b.agent_id, b.clone());

        let result = store
            .update_unique(&b.agent_id, |r| r.agent_code = "AG-1".into(), AgentRecord::clashes_with)
            .unwrap();
        assert!(result.is_err());
        assert_eq!(store.get(&b.agent_id).unwrap().agent_code, "AG-2");
    }

    #[test]
    fn app_config_debug_redacts_token() {
        let config = AppConfig {
            port: 8080,
            auth_token: Some("super-secret".into()),
        };
        let dbg = format!("{config:?}");
        assert!(!dbg.contains("super-secret"));
        assert!(dbg.contains("[REDACTED]"));
    }
}
