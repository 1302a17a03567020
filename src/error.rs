// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Application error types with consistent API responses.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// Application error type that converts to HTTP responses.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Authentication required")]
    Unauthorized,

    #[error("Invalid or expired token")]
    InvalidToken,

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Session already completed: {0}")]
    AlreadyCompleted(String),

    #[error("Account is not trainer-level: {0}")]
    NotTrainerLevel(String),

    #[error("Account is deleted: {0}")]
    DeletedAccount(String),

    #[error("Invalid request: {0}")]
    Validation(String),

    #[error("Upstream service error: {0}")]
    Upstream(String),

    /// The store aborted a transaction that lost a conflict.
    #[error("Transaction contention: {0}")]
    Contention(String),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    /// Whether the error was raised by an authorization or lookup check
    /// (these never leave partial writes behind).
    pub fn is_precondition_failure(&self) -> bool {
        matches!(
            self,
            AppError::NotFound(_)
                | AppError::Forbidden(_)
                | AppError::AlreadyCompleted(_)
                | AppError::NotTrainerLevel(_)
                | AppError::DeletedAccount(_)
                | AppError::Validation(_)
        )
    }

    /// Whether re-running the whole atomic section may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, AppError::Contention(_))
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        AppError::Validation(errors.to_string())
    }
}

/// JSON error response body
#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error, details) = match &self {
            AppError::Unauthorized => (StatusCode::UNAUTHORIZED, "unauthorized", None),
            AppError::InvalidToken => (StatusCode::UNAUTHORIZED, "invalid_token", None),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", Some(msg.clone())),
            AppError::Forbidden(msg) => {
                tracing::warn!(reason = %msg, "Forbidden request");
                (StatusCode::FORBIDDEN, "forbidden", None)
            }
            AppError::AlreadyCompleted(msg) => {
                (StatusCode::CONFLICT, "already_completed", Some(msg.clone()))
            }
            AppError::NotTrainerLevel(msg) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "not_trainer_level",
                Some(msg.clone()),
            ),
            AppError::DeletedAccount(msg) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "deleted_account",
                Some(msg.clone()),
            ),
            AppError::Validation(msg) => {
                (StatusCode::BAD_REQUEST, "bad_request", Some(msg.clone()))
            }
            AppError::Upstream(msg) => {
                tracing::error!(error = %msg, "Upstream error");
                (StatusCode::SERVICE_UNAVAILABLE, "upstream_error", None)
            }
            AppError::Contention(msg) => {
                tracing::warn!(error = %msg, "Transaction contention persisted");
                (StatusCode::SERVICE_UNAVAILABLE, "contention", None)
            }
            AppError::Internal(err) => {
                tracing::error!(error = %err, "Internal server error");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", None)
            }
        };

        let body = ErrorResponse {
            error: error.to_string(),
            details,
        };

        (status, Json(body)).into_response()
    }
}

/// Result type alias for handlers
pub type Result<T> = std::result::Result<T, AppError>;
