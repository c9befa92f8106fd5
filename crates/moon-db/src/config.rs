//! Postgres connection settings.
//!
//! A connection string is taken verbatim from `<PREFIX>_STRING` when set.
//! Otherwise it is assembled from `<PREFIX>_USERNAME`, `<PREFIX>_PASSWORD`,
//! `<PREFIX>_ENDPOINT`, `<PREFIX>_PORT`, and `<PREFIX>_NAME`.
//!
//! The operational database uses the `DB` prefix; the analytics warehouse
//! uses `REDSHIFT_DB` with port 5439.

use url::Url;

/// Fallback values for the assembled connection string.
#[derive(Debug, Clone, Copy)]
pub struct PgDefaults {
    pub username: &'static str,
    pub endpoint: &'static str,
    pub port: u16,
    pub database: &'static str,
}

impl PgDefaults {
    /// Defaults for the operational database.
    pub const OPERATIONAL: Self = Self {
        username: "postgres",
        endpoint: "127.0.0.1",
        port: 5432,
        database: "moon_agent",
    };

    /// Defaults for the Redshift-compatible warehouse.
    pub const WAREHOUSE: Self = Self {
        username: "admin",
        endpoint: "127.0.0.1",
        port: 5439,
        database: "dev",
    };
}

/// A resolved Postgres connection string.
///
/// Custom `Debug` redacts the URL, which may embed a password.
#[derive(Clone)]
pub struct PgSettings {
    url: String,
    label: String,
}

impl std::fmt::Debug for PgSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PgSettings")
            .field("url", &"[REDACTED]")
            .field("endpoint", &self.label)
            .finish()
    }
}

impl PgSettings {
    /// Use an explicit connection string.
    pub fn from_url(raw: &str) -> Result<Self, ConfigError> {
        let parsed =
            Url::parse(raw).map_err(|e| ConfigError::InvalidUrl(redact(raw), e.to_string()))?;
        if !matches!(parsed.scheme(), "postgres" | "postgresql") {
            return Err(ConfigError::UnsupportedScheme(parsed.scheme().to_string()));
        }
        Ok(Self {
            url: raw.to_string(),
            label: endpoint_label(&parsed),
        })
    }

    /// Resolve settings for `prefix` using `lookup` to read variables.
    ///
    /// Returns `Ok(None)` when neither `<PREFIX>_STRING` nor
    /// `<PREFIX>_ENDPOINT` is present.
    pub fn resolve(
        prefix: &str,
        defaults: PgDefaults,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Option<Self>, ConfigError> {
        let var = |suffix: &str| lookup(&format!("{prefix}_{suffix}"));

        if let Some(raw) = var("STRING") {
            return Self::from_url(&raw).map(Some);
        }
        let Some(endpoint) = var("ENDPOINT") else {
            return Ok(None);
        };
        Self::assemble(prefix, defaults, &endpoint, &var).map(Some)
    }

    /// Like [`PgSettings::resolve`], but falls back to the default endpoint
    /// instead of returning `None`.
    pub fn resolve_or_default(
        prefix: &str,
        defaults: PgDefaults,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let var = |suffix: &str| lookup(&format!("{prefix}_{suffix}"));

        if let Some(raw) = var("STRING") {
            return Self::from_url(&raw);
        }
        let endpoint = var("ENDPOINT").unwrap_or_else(|| defaults.endpoint.to_string());
        Self::assemble(prefix, defaults, &endpoint, &var)
    }

    fn assemble(
        prefix: &str,
        defaults: PgDefaults,
        endpoint: &str,
        var: &dyn Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let port = match var("PORT") {
            Some(raw) => raw
                .parse::<u16>()
                .map_err(|_| ConfigError::InvalidPort(format!("{prefix}_PORT"), raw))?,
            None => defaults.port,
        };
        let username = var("USERNAME").unwrap_or_else(|| defaults.username.to_string());
        let database = var("NAME").unwrap_or_else(|| defaults.database.to_string());

        let base = format!("postgres://{endpoint}:{port}/{database}");
        let mut url = Url::parse(&base)
            .map_err(|e| ConfigError::InvalidUrl(format!("{prefix}_ENDPOINT"), e.to_string()))?;
        url.set_username(&username)
            .map_err(|_| ConfigError::InvalidUrl(format!("{prefix}_USERNAME"), username.clone()))?;
        if let Some(password) = var("PASSWORD") {
            url.set_password(Some(&password))
                .map_err(|_| ConfigError::InvalidUrl(format!("{prefix}_PASSWORD"), "[REDACTED]".into()))?;
        }

        Ok(Self {
            label: endpoint_label(&url),
            url: url.into(),
        })
    }

    /// The full connection string. Never log this.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// `host:port/database`, safe to log.
    pub fn endpoint_label(&self) -> &str {
        &self.label
    }
}

/// Operational database configuration.
#[derive(Debug, Clone)]
pub struct DbConfig {
    pub settings: PgSettings,
    /// Upper bound on pooled connections.
    pub max_connections: u32,
    /// Seconds to wait for a free connection.
    pub acquire_timeout_secs: u64,
}

impl DbConfig {
    /// Wrap explicit settings with default pool sizing.
    pub fn new(settings: PgSettings) -> Self {
        Self {
            settings,
            max_connections: 10,
            acquire_timeout_secs: 5,
        }
    }

    /// Load from `DB_*` environment variables, falling back to a local default endpoint.
    ///
    /// Variables:
    /// - `DB_STRING` (full connection string; wins over the parts below)
    /// - `DB_USERNAME` (default: `postgres`)
    /// - `DB_PASSWORD` (optional)
    /// - `DB_ENDPOINT` (default: `127.0.0.1`)
    /// - `DB_PORT` (default: 5432)
    /// - `DB_NAME` (default: `moon_agent`)
    /// - `DB_MAX_CONNECTIONS` (default: 10)
    pub fn from_env() -> Result<Self, ConfigError> {
        let settings =
            PgSettings::resolve_or_default("DB", PgDefaults::OPERATIONAL, env_lookup)?;
        Ok(Self::new(settings).with_env_pool_size())
    }

    /// Load from `DB_*` environment variables, or `None` if no database is configured.
    pub fn from_env_optional() -> Result<Option<Self>, ConfigError> {
        let settings = PgSettings::resolve("DB", PgDefaults::OPERATIONAL, env_lookup)?;
        Ok(settings.map(|s| Self::new(s).with_env_pool_size()))
    }

    fn with_env_pool_size(mut self) -> Self {
        if let Some(n) = env_lookup("DB_MAX_CONNECTIONS").and_then(|s| s.parse().ok()) {
            self.max_connections = n;
        }
        self
    }
}

/// Read a non-empty environment variable.
pub fn env_lookup(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn endpoint_label(url: &Url) -> String {
    format!(
        "{}:{}{}",
        url.host_str().unwrap_or("?"),
        url.port().map(|p| p.to_string()).unwrap_or_else(|| "default".into()),
        url.path()
    )
}

fn redact(raw: &str) -> String {
    match raw.split_once('@') {
        Some((_, rest)) => format!("[REDACTED]@{rest}"),
        None => raw.to_string(),
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid connection string for {0}: {1}")]
    InvalidUrl(String, String),
    #[error("unsupported database scheme \"{0}\" (expected postgres or postgresql)")]
    UnsupportedScheme(String),
    #[error("invalid port in {0}: \"{1}\"")]
    InvalidPort(String, String),
}
