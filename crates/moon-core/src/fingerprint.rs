//! # File Fingerprints
//!
//! A [`Fingerprint`] is the dedup key for processed files: SHA-256 over the
//! UTF-8 bytes of the file's *base name*, rendered as 64 lowercase hex
//! characters.
//!
//! The digest never looks at file content. A modified file that keeps its
//! name maps to the same fingerprint and is skipped by every later run.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::ValidationError;

/// A key returned by a bucket listing (e.g. `sales/2024/a.csv`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ObjectKey(String);

impl ObjectKey {
    /// Wrap a raw object key.
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Return the full key.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The text after the last `/`, or the whole key when it has no `/`.
    pub fn base_name(&self) -> &str {
        match self.0.rfind('/') {
            Some(idx) => &self.0[idx + 1..],
            None => &self.0,
        }
    }

    /// The base name, rejecting keys that end in `/` or are empty.
    pub fn file_name(&self) -> Result<&str, ValidationError> {
        let name = self.base_name();
        if name.is_empty() {
            return Err(ValidationError::MissingFileName(self.0.clone()));
        }
        Ok(name)
    }
}

impl std::fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ObjectKey {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for ObjectKey {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Hex-encoded SHA-256 digest of a file's base name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Fingerprint a file name.
    pub fn of_name(name: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(name.as_bytes());
        let digest = hasher.finalize();
        Self(digest.iter().map(|b| format!("{b:02x}")).collect())
    }

    /// Fingerprint the base name of an object key. Directory components are ignored.
    pub fn of_key(key: &ObjectKey) -> Self {
        Self::of_name(key.base_name())
    }

    /// Rebuild a fingerprint read back from storage.
    ///
    /// Accepts only 64 lowercase hex characters.
    pub fn from_hex(hex: &str) -> Option<Self> {
        let valid = hex.len() == 64
            && hex
                .bytes()
                .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b));
        valid.then(|| Self(hex.to_string()))
    }

    /// Return the hex digest.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}
