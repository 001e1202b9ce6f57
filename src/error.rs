// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Application error types with consistent API responses.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// Errors reported by the hosted backend (identity and table APIs).
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum BackendError {
    /// The requested row does not exist.
    #[error("Row not found")]
    NotFound,

    /// A code or refresh token was rejected (invalid, expired or already used).
    #[error("{0}")]
    InvalidGrant(String),

    /// The access token was rejected.
    #[error("Invalid or expired access token: {0}")]
    Unauthorized(String),

    /// A row-level access policy denied the operation.
    #[error("{0}")]
    PermissionDenied(String),

    /// The write collided with an existing row (unique constraint).
    #[error("{0}")]
    Conflict(String),

    #[error("{message}")]
    Api { status: u16, message: String },

    #[error("Backend request failed: {0}")]
    Transport(String),
}

impl BackendError {
    /// Whether the backend rejected the caller's credentials, as opposed to
    /// failing for an unrelated reason.
    pub fn is_auth_rejection(&self) -> bool {
        matches!(
            self,
            BackendError::InvalidGrant(_) | BackendError::Unauthorized(_)
        )
    }
}

impl From<reqwest::Error> for BackendError {
    fn from(err: reqwest::Error) -> Self {
        BackendError::Transport(err.to_string())
    }
}

/// Application error type that converts to HTTP responses.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Authentication required")]
    Unauthorized,

    #[error("Not allowed to act on this resource")]
    Forbidden,

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// Backend failure surfaced verbatim to the caller.
    #[error("{0}")]
    Backend(String),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl From<BackendError> for AppError {
    fn from(err: BackendError) -> Self {
        AppError::Backend(err.to_string())
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(err: validator::ValidationErrors) -> Self {
        AppError::BadRequest(err.to_string())
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
        let (status, error, details) = match self {
            AppError::Unauthorized => (StatusCode::UNAUTHORIZED, "unauthorized".to_string(), None),
            AppError::Forbidden => (StatusCode::FORBIDDEN, "forbidden".to_string(), None),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found".to_string(), Some(msg)),
            AppError::BadRequest(msg) => {
                (StatusCode::BAD_REQUEST, "bad_request".to_string(), Some(msg))
            }
            AppError::Backend(msg) => {
                tracing::error!(error = %msg, "Backend error");
                (StatusCode::INTERNAL_SERVER_ERROR, msg, None)
            }
            AppError::Internal(err) => {
                tracing::error!(error = %err, "Internal server error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error".to_string(),
                    None,
                )
            }
        };

        (status, Json(ErrorResponse { error, details })).into_response()
    }
}

/// Result type alias for handlers
pub type Result<T> = std::result::Result<T, AppError>;
