//! # Validation Errors
//!
//! Structured error type for domain primitive construction, built with
//! `thiserror`. Each variant carries the rejected input so that operators
//! can diagnose a bad request or misconfiguration without guesswork.

use thiserror::Error;

/// Validation errors for domain primitive newtypes.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// A required text field was empty or whitespace.
    #[error("{field} must not be empty")]
    Empty {
        /// Name of the offending field.
        field: &'static str,
    },

    /// A text field exceeded its column width.
    #[error("{field} must not exceed {max} characters (got {actual})")]
    TooLong {
        /// Name of the offending field.
        field: &'static str,
        /// Maximum permitted length.
        max: usize,
        /// Length of the rejected value.
        actual: usize,
    },

    /// Email address is not of the form `local@domain.tld`.
    #[error("invalid email address: \"{0}\"")]
    InvalidEmail(String),

    /// Phone number contains characters other than digits, spaces, `+`, `-`, `(`, `)`.
    #[error("invalid phone number: \"{0}\"")]
    InvalidPhone(String),

    /// Name is not a plain SQL identifier (`[A-Za-z_][A-Za-z0-9_]*`).
    #[error("invalid SQL identifier: \"{0}\" (expected [A-Za-z_][A-Za-z0-9_]*, at most 63 bytes)")]
    InvalidIdentifier(String),

    /// Object key has no base name (empty, or ends with `/`).
    #[error("object key \"{0}\" has no file name")]
    MissingFileName(String),
}
