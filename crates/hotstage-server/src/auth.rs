//! Bearer token authentication middleware.
//!
//! Token comparison uses constant-time comparison to prevent timing attacks.

use axum::{
    body::Body,
    extract::{Request, State},
    http::{StatusCode, header::AUTHORIZATION},
    middleware::Next,
    response::{IntoResponse, Response},
};
use subtle::ConstantTimeEq;

use crate::state::AppState;

// ─────────────────────────────────────────────────────────────────────────────
// Auth Error
// ─────────────────────────────────────────────────────────────────────────────

/// Authentication error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// Missing authorization header.
    MissingToken,
    /// Authorization header is not a bearer token.
    InvalidFormat,
    /// Token validation failed.
    InvalidToken,
}

impl std::fmt::Display for AuthError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuthError::MissingToken => write!(f, "Missing authorization token"),
            AuthError::InvalidFormat => write!(f, "Invalid authorization format"),
            AuthError::InvalidToken => write!(f, "Invalid token"),
        }
    }
}

impl std::error::Error for AuthError {}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = match self {
            AuthError::MissingToken | AuthError::InvalidToken => StatusCode::UNAUTHORIZED,
            AuthError::InvalidFormat => StatusCode::BAD_REQUEST,
        };

        let body = serde_json::json!({
            "code": "unauthorized",
            "message": self.to_string(),
        });

        (status, axum::Json(body)).into_response()
    }
}

/// Compare two strings in constant time.
///
/// Different lengths still run a comparison of equal cost before returning
/// false.
fn constant_time_eq(a: &str, b: &str) -> bool {
    let a_bytes = a.as_bytes();
    let b_bytes = b.as_bytes();

    if a_bytes.len() == b_bytes.len() {
        a_bytes.ct_eq(b_bytes).into()
    } else {
        let _ = a_bytes.ct_eq(a_bytes);
        false
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Middleware
// ─────────────────────────────────────────────────────────────────────────────

/// Authentication middleware function.
pub async fn auth_middleware(
    State(state): State<AppState>,
    request: Request<Body>,
    next: Next,
) -> Result<Response, AuthError> {
    validate_request(&request, &state)?;
    Ok(next.run(request).await)
}

fn validate_request(request: &Request<Body>, state: &AppState) -> Result<(), AuthError> {
    // No token configured: localhost mode
    let Some(ref expected_token) = state.config().auth_token else {
        return Ok(());
    };

    let header = request
        .headers()
        .get(AUTHORIZATION)
        .ok_or(AuthError::MissingToken)?;
    let value = header.to_str().map_err(|_| AuthError::InvalidFormat)?;
    let token = value
        .strip_prefix("Bearer ")
        .ok_or(AuthError::InvalidFormat)?;

    if constant_time_eq(token, expected_token) {
        Ok(())
    } else {
        tracing::warn!(path = %request.uri().path(), "Rejected request with invalid token");
        Err(AuthError::InvalidToken)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
