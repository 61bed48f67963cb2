//! Request handlers.

pub mod auth;
pub mod files;
pub mod health;
pub mod oauth;
pub mod uploads;

use axum::Json;
use axum::extract::rejection::JsonRejection;

use crate::error::{AppError, AppResult};

/// Unwrap a JSON body, turning extractor rejections into 400s.
pub(crate) fn json_body<T>(payload: Result<Json<T>, JsonRejection>) -> AppResult<T> {
    payload
        .map(|Json(body)| body)
        .map_err(|e| AppError::Validation(format!("invalid input: {}", e.body_text())))
}
