//! # Request Validation
//!
//! The [`Validate`] trait for request DTOs plus helpers that turn JSON
//! rejections and rule violations into [`AppError`]s.

use axum::extract::rejection::JsonRejection;
use axum::Json;

use crate::error::AppError;

/// Business rules checked after deserialization.
pub trait Validate {
    /// Returns a message describing the first violated rule.
    fn validate(&self) -> Result<(), String>;
}

/// Unwrap a JSON body, mapping deserialization errors to [`AppError::BadRequest`].
pub fn extract_json<T>(result: Result<Json<T>, JsonRejection>) -> Result<T, AppError> {
    result
        .map(|Json(v)| v)
        .map_err(|err| AppError::BadRequest(err.body_text()))
}

/// [`extract_json`] followed by [`Validate::validate`].
pub fn extract_validated_json<T: Validate>(
    result: Result<Json<T>, JsonRejection>,
) -> Result<T, AppError> {
    let value = extract_json(result)?;
    value.validate().map_err(AppError::Validation)?;
    Ok(value)
}

/// Trimmed, non-empty text no longer than `max` characters.
pub(crate) fn required_text(field: &str, value: &str, max: usize) -> Result<(), String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(format!("{field} must not be empty"));
    }
    let len = trimmed.chars().count();
    if len > max {
        return Err(format!("{field} must not exceed {max} characters (got {len})"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Named(String);

    impl Validate for Named {
        fn validate(&self) -> Result<(), String> {
            required_text("name", &self.0, 5)
        }
    }

    #[test]
    fn validated_json_passes_good_value() {
        let value = extract_validated_json(Ok(Json(Named("Moon".into())))).unwrap();
        assert_eq!(value.0, "Moon");
    }

    #[test]
    fn validated_json_rejects_blank() {
        let err = extract_validated_json(Ok(Json(Named("   ".into())))).unwrap_err();
        assert!(matches!(err, AppError::Validation(ref m) if m == "name must not be empty"));
    }

    #[test]
    fn required_text_counts_characters() {
        assert!(required_text("name", "ශ්‍රී", 5).is_ok());
        assert!(required_text("name", "abcdef", 5).is_err());
    }
}
