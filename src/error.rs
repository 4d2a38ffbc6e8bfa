//! Error types for Quartermaster server

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use crate::repository::loans::ITEM_ON_LOAN;

/// Numeric error codes carried in every error response body
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum ErrorCode {
    Success = 0,
    Failure = 1,
    DbFailure = 2,
    BadValue = 3,
    NoSuchEntity = 4,
    Duplicate = 5,
    ItemOnLoan = 6,
    UnreadableInput = 7,
    NotificationFailure = 8,
}

/// Main application error type
#[derive(Error, Debug)]
pub enum AppError {
    /// Malformed or missing input; nothing was persisted
    #[error("Validation error: {0}")]
    Validation(String),

    /// Uniqueness or exclusivity violated
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Referenced entity does not resolve to an eligible record
    #[error("Not found: {0}")]
    NotFound(String),

    /// Bulk input could not be read at all
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Notification error: {0}")]
    Notification(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl AppError {
    /// Message without the kind prefix, as reported in import rows
    pub fn detail(&self) -> String {
        match self {
            AppError::Validation(msg)
            | AppError::Conflict(msg)
            | AppError::NotFound(msg)
            | AppError::Transport(msg)
            | AppError::Notification(msg)
            | AppError::Internal(msg) => msg.clone(),
            AppError::Database(e) => e.to_string(),
        }
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, AppError::Conflict(_))
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        AppError::Validation(errors.to_string())
    }
}

/// Only the loan exclusivity refusal is `ItemOnLoan`; every other conflict is a duplicate
fn conflict_code(message: &str) -> ErrorCode {
    if message == ITEM_ON_LOAN {
        ErrorCode::ItemOnLoan
    } else {
        ErrorCode::Duplicate
    }
}

/// Error response body
#[derive(Serialize, utoipa::ToSchema)]
pub struct ErrorResponse {
    pub code: u32,
    pub error: String,
    pub message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::Validation(msg) => {
                (StatusCode::BAD_REQUEST, ErrorCode::BadValue, msg.clone())
            }
            AppError::Conflict(msg) => (StatusCode::CONFLICT, conflict_code(msg), msg.clone()),
            AppError::NotFound(msg) => {
                (StatusCode::NOT_FOUND, ErrorCode::NoSuchEntity, msg.clone())
            }
            AppError::Transport(msg) => {
                (StatusCode::BAD_REQUEST, ErrorCode::UnreadableInput, msg.clone())
            }
            AppError::Notification(msg) => {
                tracing::error!("Notification error: {}", msg);
                (StatusCode::BAD_GATEWAY, ErrorCode::NotificationFailure, msg.clone())
            }
            AppError::Database(e) => {
                tracing::error!("Database error: {:?}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorCode::DbFailure,
                    "Database error".to_string(),
                )
            }
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorCode::Failure,
                    "Internal server error".to_string(),
                )
            }
        };

        let body = Json(ErrorResponse {
            code: code as u32,
            error: format!("{:?}", code),
            message,
        });

        (status, body).into_response()
    }
}

/// Result type alias for application operations
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detail_strips_kind_prefix() {
        let err = AppError::Conflict("Email 'a@b.c' already exists".to_string());
        assert_eq!(err.to_string(), "Conflict: Email 'a@b.c' already exists");
        assert_eq!(err.detail(), "Email 'a@b.c' already exists");
    }

    #[test]
    fn test_conflict_code_matches_exclusivity_message_exactly() {
        assert_eq!(conflict_code(ITEM_ON_LOAN), ErrorCode::ItemOnLoan);
        assert_eq!(
            conflict_code("Serial number 'still on loan' already exists"),
            ErrorCode::Duplicate
        );
        assert_eq!(
            conflict_code("Email 'a@b.c' already exists"),
            ErrorCode::Duplicate
        );
    }

    #[test]
    fn test_status_mapping() {
        let cases = [
            (AppError::Validation("x".into()), StatusCode::BAD_REQUEST),
            (AppError::Conflict("item already on loan".into()), StatusCode::CONFLICT),
            (AppError::NotFound("x".into()), StatusCode::NOT_FOUND),
            (AppError::Transport("x".into()), StatusCode::BAD_REQUEST),
            (AppError::Internal("x".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, status) in cases {
            assert_eq!(err.into_response().status(), status);
        }
    }
}
