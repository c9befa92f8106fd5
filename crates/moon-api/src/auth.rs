//! # Bearer Token Authentication
//!
//! A single static token guards every route except the health probes and
//! the metrics scrape. With no token configured, authentication is off.

use axum::extract::Request;
use axum::http::{header, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;
use axum_extra::headers::authorization::Bearer;
use axum_extra::headers::{Authorization, HeaderMapExt};
use subtle::ConstantTimeEq;

use crate::error::{ErrorBody, ErrorDetail};

/// Auth configuration injected into request extensions.
///
/// Custom `Debug` redacts the token.
#[derive(Clone)]
pub struct AuthConfig {
    pub token: Option<String>,
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("token", &self.token.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

/// Compare tokens without leaking prefix or length through timing.
fn constant_time_token_eq(provided: &str, expected: &str) -> bool {
    let provided = provided.as_bytes();
    let expected = expected.as_bytes();
    if provided.len() != expected.len() {
        let _ = expected.ct_eq(expected);
        return false;
    }
    provided.ct_eq(expected).into()
}

/// Reject requests whose `Authorization: Bearer` token doesn't match
/// [`AuthConfig::token`].
pub async fn auth_middleware(request: Request, next: Next) -> Response {
    let expected = request
        .extensions()
        .get::<AuthConfig>()
        .and_then(|config| config.token.clone());

    let Some(expected) = expected else {
        return next.run(request).await;
    };

    if !request.headers().contains_key(header::AUTHORIZATION) {
        tracing::warn!("authentication failed: missing authorization header");
        return unauthorized_response("missing authorization header");
    }

    match request.headers().typed_get::<Authorization<Bearer>>() {
        Some(Authorization(bearer)) if constant_time_token_eq(bearer.token(), &expected) => {
            next.run(request).await
        }
        Some(_) => {
            tracing::warn!("authentication failed: invalid bearer token");
            unauthorized_response("invalid bearer token")
        }
        None => {
            tracing::warn!("authentication failed: non-Bearer authorization scheme");
            unauthorized_response("authorization header must use Bearer scheme")
        }
    }
}

fn unauthorized_response(message: &str) -> Response {
    let body = ErrorBody {
        error: ErrorDetail {
            code: "UNAUTHORIZED".to_string(),
            message: message.to_string(),
            details: None,
        },
    };
    (StatusCode::UNAUTHORIZED, Json(body)).into_response()
}
