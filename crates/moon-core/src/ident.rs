//! # SQL Identifiers
//!
//! Table and column names that are interpolated into SQL text (CSV headers,
//! destination tables, warehouse tables) must pass through
//! [`SqlIdentifier::new`]. Only plain identifiers are accepted, and
//! [`SqlIdentifier::quoted`] always double-quotes them.

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Postgres truncates identifiers beyond this many bytes.
const MAX_IDENTIFIER_LEN: usize = 63;

/// A validated table or column name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SqlIdentifier(String);

impl SqlIdentifier {
    /// Validate a name against `[A-Za-z_][A-Za-z0-9_]*`. Surrounding whitespace is trimmed.
    pub fn new(name: &str) -> Result<Self, ValidationError> {
        let name = name.trim();
        let mut bytes = name.bytes();
        let head_ok = matches!(bytes.next(), Some(b) if b.is_ascii_alphabetic() || b == b'_');
        let tail_ok = bytes.all(|b| b.is_ascii_alphanumeric() || b == b'_');
        if !head_ok || !tail_ok || name.len() > MAX_IDENTIFIER_LEN {
            return Err(ValidationError::InvalidIdentifier(name.to_string()));
        }
        Ok(Self(name.to_string()))
    }

    /// `sales_transaction`, the table ingested sales rows land in by default.
    pub fn sales_transaction() -> Self {
        Self(String::from("sales_transaction"))
    }

    /// The bare name.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The name wrapped in double quotes, safe to splice into SQL.
    pub fn quoted(&self) -> String {
        format!("\"{}\"", self.0)
    }
}

impl TryFrom<String> for SqlIdentifier {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(&value)
    }
}

impl From<SqlIdentifier> for String {
    fn from(value: SqlIdentifier) -> Self {
        value.0
    }
}

impl std::fmt::Display for SqlIdentifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}
