use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;
use tracing::error;

/// Domain errors every handler can return. Each variant maps to one status
/// code and a `{"message": ...}` JSON body.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Conflict(String),

    /// Deliberately the same message for unknown email and wrong password.
    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("{0}")]
    Unauthenticated(String),

    #[error("Unauthorized")]
    Forbidden,

    #[error("{0}")]
    NotFound(String),

    #[error("Internal server error")]
    Internal { detail: Option<String> },
}

pub type ApiResult<T> = Result<T, ApiError>;

impl ApiError {
    /// Wraps an unexpected failure. The full error chain is always logged;
    /// it is echoed to the caller only when `expose` is set.
    pub fn internal(err: anyhow::Error, expose: bool) -> Self {
        error!(error = %format!("{err:#}"), "request failed");
        Self::Internal {
            detail: expose.then(|| format!("{err:#}")),
        }
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::Validation(msg) | ApiError::Conflict(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::InvalidCredentials => {
                (StatusCode::BAD_REQUEST, "Invalid credentials".to_string())
            }
            ApiError::Unauthenticated(msg) => (StatusCode::UNAUTHORIZED, msg),
            ApiError::Forbidden => (StatusCode::UNAUTHORIZED, "Unauthorized".to_string()),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::Internal { detail } => (
                StatusCode::INTERNAL_SERVER_ERROR,
                detail.unwrap_or_else(|| "Internal server error".to_string()),
            ),
        };

        (status, Json(ErrorBody { message })).into_response()
    }
}
