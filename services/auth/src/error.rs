//! Custom error types for the authentication service

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

/// Custom error type for authentication operations
///
/// Credential failures are deliberately uniform: the caller can never tell
/// whether the email was unknown or the password wrong.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum AuthError {
    /// Login failed
    #[error("Invalid credentials")]
    InvalidCredentials,

    /// Missing, expired, malformed, revoked, or replayed token
    #[error("Unauthenticated")]
    Unauthenticated,

    /// Internal server error
    #[error("Internal server error")]
    Internal,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            AuthError::InvalidCredentials => (StatusCode::UNAUTHORIZED, "Invalid credentials"),
            AuthError::Unauthenticated => (StatusCode::UNAUTHORIZED, "Unauthenticated"),
            AuthError::Internal => (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error"),
        };

        let body = Json(json!({
            "error": error_message,
        }));

        (status, body).into_response()
    }
}
