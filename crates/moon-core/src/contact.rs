//! # Contact Details
//!
//! Validated email and phone newtypes for agent records. Widths match the
//! `agent` table columns.

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

const EMAIL_MAX: usize = 255;
const PHONE_MAX: usize = 20;

/// A syntactically valid email address (`local@domain.tld`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct EmailAddress(String);

impl EmailAddress {
    /// Validate an email address.
    ///
    /// Requires exactly one `@`, a non-empty local part without whitespace,
    /// and a domain with at least one interior `.`.
    pub fn new(raw: &str) -> Result<Self, ValidationError> {
        let email = raw.trim();
        if email.is_empty() {
            return Err(ValidationError::Empty { field: "email" });
        }
        if email.len() > EMAIL_MAX {
            return Err(ValidationError::TooLong {
                field: "email",
                max: EMAIL_MAX,
                actual: email.len(),
            });
        }
        let invalid = || ValidationError::InvalidEmail(email.to_string());
        let (local, domain) = email.split_once('@').ok_or_else(invalid)?;
        if local.is_empty()
            || domain.contains('@')
            || email.chars().any(char::is_whitespace)
        {
            return Err(invalid());
        }
        let labels: Vec<&str> = domain.split('.').collect();
        if labels.len() < 2 || labels.iter().any(|l| l.is_empty()) {
            return Err(invalid());
        }
        Ok(Self(email.to_string()))
    }

    /// Return the address.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for EmailAddress {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(&value)
    }
}

impl From<EmailAddress> for String {
    fn from(value: EmailAddress) -> Self {
        value.0
    }
}

impl std::fmt::Display for EmailAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A phone number: digits plus common separators, at most 20 characters.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PhoneNumber(String);

impl PhoneNumber {
    /// Validate a phone number.
    pub fn new(raw: &str) -> Result<Self, ValidationError> {
        let phone = raw.trim();
        if phone.is_empty() {
            return Err(ValidationError::Empty { field: "phone" });
        }
        if phone.len() > PHONE_MAX {
            return Err(ValidationError::TooLong {
                field: "phone",
                max: PHONE_MAX,
                actual: phone.len(),
            });
        }
        let allowed = |c: char| c.is_ascii_digit() || matches!(c, ' ' | '+' | '-' | '(' | ')');
        if !phone.chars().all(allowed) || !phone.chars().any(|c| c.is_ascii_digit()) {
            return Err(ValidationError::InvalidPhone(phone.to_string()));
        }
        Ok(Self(phone.to_string()))
    }

    /// Return the number as entered (trimmed).
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for PhoneNumber {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(&value)
    }
}

impl From<PhoneNumber> for String {
    fn from(value: PhoneNumber) -> Self {
        value.0
    }
}

impl std::fmt::Display for PhoneNumber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}
