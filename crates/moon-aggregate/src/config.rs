//! Warehouse connection settings.

use moon_db::{env_lookup, ConfigError, PgDefaults, PgSettings};

/// Connection settings for the Redshift-compatible warehouse.
#[derive(Debug, Clone)]
pub struct WarehouseConfig {
    /// Resolved connection string (redacted in `Debug`).
    pub settings: PgSettings,
    /// Upper bound on pooled warehouse connections.
    pub max_connections: u32,
}

impl WarehouseConfig {
    /// Load from `REDSHIFT_DB_*` environment variables.
    ///
    /// - `REDSHIFT_DB_STRING` (full connection string; wins over the parts below)
    /// - `REDSHIFT_DB_USERNAME` (default: `admin`)
    /// - `REDSHIFT_DB_PASSWORD` (optional)
    /// - `REDSHIFT_DB_ENDPOINT` (default: `127.0.0.1`)
    /// - `REDSHIFT_DB_PORT` (default: 5439)
    /// - `REDSHIFT_DB_NAME` (default: `dev`)
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(env_lookup)
    }

    /// Resolve with an explicit variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let settings = PgSettings::resolve_or_default("REDSHIFT_DB", PgDefaults::WAREHOUSE, lookup)?;
        Ok(Self {
            settings,
            max_connections: 2,
        })
    }
}
