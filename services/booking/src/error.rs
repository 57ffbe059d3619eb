//! Custom error types for the booking service

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

/// Custom error type for booking operations
#[derive(Error, Debug)]
pub enum ApiError {
    /// Missing or invalid access token
    #[error("Unauthenticated")]
    Unauthenticated,

    /// Authenticated but not allowed to perform the operation
    #[error("Forbidden")]
    Forbidden,

    /// Requested entity does not exist
    #[error("Not found")]
    NotFound,

    /// Generic validation failure with message
    #[error("{0}")]
    Validation(String),

    /// The requested slot overlaps an existing active reservation
    #[error("This time slot overlaps with an existing reservation")]
    SlotOverlap,

    /// The requested slot falls outside configured business hours
    #[error("Reservations must fall within business hours")]
    OutsideBusinessHours,

    /// The requested date is in the past
    #[error("Cannot book dates in the past")]
    PastDate,

    /// The requested date exceeds the advance booking window
    #[error("Cannot book that far in advance")]
    TooFarInAdvance,

    /// The reservation's status or date no longer allows changes
    #[error("This reservation cannot be modified due to its status or date constraints")]
    NotEditable,

    /// The reservation does not satisfy the trade conditions
    #[error("This reservation cannot be traded")]
    NotTradeable,

    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Internal server error
    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_message) = match &self {
            ApiError::Unauthenticated => (StatusCode::UNAUTHORIZED, self.to_string()),
            ApiError::Forbidden => (StatusCode::FORBIDDEN, self.to_string()),
            ApiError::NotFound => (StatusCode::NOT_FOUND, self.to_string()),
            ApiError::Validation(_)
            | ApiError::OutsideBusinessHours
            | ApiError::PastDate
            | ApiError::TooFarInAdvance
            | ApiError::NotEditable
            | ApiError::NotTradeable => (StatusCode::BAD_REQUEST, self.to_string()),
            ApiError::SlotOverlap => (StatusCode::CONFLICT, self.to_string()),
            ApiError::Database(e) => {
                error!("Database error: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
            ApiError::Internal(e) => {
                error!("Internal error: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };

        let body = Json(json!({
            "error": error_message,
        }));

        (status, body).into_response()
    }
}

/// Type alias for booking results
pub type ApiResult<T> = Result<T, ApiError>;
