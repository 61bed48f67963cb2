//! Application error types.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;
use tracing::error;
use upgate_core::auth::{AuthError, AuthErrorKind};
use upgate_core::uploads::UploadError;

use crate::models::ErrorResponse;

/// Convenience alias for handler return types.
pub type AppResult<T> = Result<T, AppError>;

/// Application-level errors with HTTP status mapping.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Payload too large: {0}")]
    PayloadTooLarge(String),

    #[error("Too many requests")]
    TooManyRequests,

    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("Bad gateway: {0}")]
    BadGateway(String),

    #[error("Internal server error")]
    Internal(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error, message) = match &self {
            AppError::Validation(m) => (StatusCode::BAD_REQUEST, "validation_error", m.as_str()),
            AppError::Unauthorized(m) => (StatusCode::UNAUTHORIZED, "unauthorized", m.as_str()),
            AppError::NotFound(m) => (StatusCode::NOT_FOUND, "not_found", m.as_str()),
            AppError::Conflict(m) => (StatusCode::CONFLICT, "conflict", m.as_str()),
            AppError::PayloadTooLarge(m) => {
                (StatusCode::PAYLOAD_TOO_LARGE, "payload_too_large", m.as_str())
            }
            AppError::TooManyRequests => (
                StatusCode::TOO_MANY_REQUESTS,
                "rate_limited",
                "too many requests",
            ),
            AppError::ServiceUnavailable(m) => {
                (StatusCode::SERVICE_UNAVAILABLE, "service_unavailable", m.as_str())
            }
            AppError::BadGateway(m) => (StatusCode::BAD_GATEWAY, "bad_gateway", m.as_str()),
            AppError::Internal(detail) => {
                error!(%detail, "internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "Internal server error",
                )
            }
        };
        let body = Json(ErrorResponse {
            error: error.to_string(),
            message: message.to_string(),
        });
        (status, body).into_response()
    }
}

impl From<AuthError> for AppError {
    fn from(e: AuthError) -> Self {
        match e.kind() {
            AuthErrorKind::InvalidCredentials => AppError::Unauthorized("invalid credentials".into()),
            AuthErrorKind::UserNotFound
            | AuthErrorKind::InvalidToken
            | AuthErrorKind::InvalidTokenType => AppError::Unauthorized("invalid token".into()),
            AuthErrorKind::InvalidState | AuthErrorKind::OAuthProvider => {
                AppError::Unauthorized(e.message().to_string())
            }
            AuthErrorKind::UserAlreadyExists => AppError::Conflict("user already exists".into()),
            AuthErrorKind::TokenSignature | AuthErrorKind::Internal => {
                AppError::Internal(error_chain(&e))
            }
        }
    }
}

impl From<UploadError> for AppError {
    fn from(e: UploadError) -> Self {
        match e {
            UploadError::FileSizeInvalid => AppError::Validation(e.to_string()),
            UploadError::FileSizeExceeded => AppError::PayloadTooLarge(e.to_string()),
            UploadError::UploadNotFound => AppError::NotFound(e.to_string()),
            UploadError::CircuitOpen | UploadError::ServiceUnavailable => {
                AppError::ServiceUnavailable(e.to_string())
            }
            UploadError::Downstream(_) => AppError::BadGateway("upload service call failed".into()),
        }
    }
}

/// Render an error and its causes on one line, for logs.
fn error_chain(e: &(dyn std::error::Error + 'static)) -> String {
    let mut out = e.to_string();
    let mut cause = e.source();
    while let Some(c) = cause {
        out.push_str(": ");
        out.push_str(&c.to_string());
        cause = c.source();
    }
    out
}
