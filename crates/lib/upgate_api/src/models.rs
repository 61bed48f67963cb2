//! Request and response bodies.

use serde::{Deserialize, Serialize};
use upgate_core::auth::password::MAX_PASSWORD_BYTES;
use upgate_core::models::auth::Registration;
use upgate_core::models::uploads::FileRecord;

use crate::error::AppError;

/// Minimum accepted password length at registration.
pub const MIN_PASSWORD_LEN: usize = 6;

/// Body of every error response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

impl LoginRequest {
    pub fn validate(&self) -> Result<(), AppError> {
        if self.email.trim().is_empty() || self.password.is_empty() {
            return Err(AppError::Validation("email and password are required".into()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password: String,
}

impl RegisterRequest {
    /// Check field constraints and convert into a core [`Registration`].
    pub fn into_registration(self) -> Result<Registration, AppError> {
        let name = self.name.trim();
        if name.is_empty() {
            return Err(AppError::Validation("name is required".into()));
        }
        let email = self.email.trim();
        if email.is_empty() || !email.contains('@') {
            return Err(AppError::Validation("a valid email is required".into()));
        }
        if self.password.chars().count() < MIN_PASSWORD_LEN {
            return Err(AppError::Validation(format!(
                "password must be at least {MIN_PASSWORD_LEN} characters"
            )));
        }
        if self.password.len() > MAX_PASSWORD_BYTES {
            return Err(AppError::Validation(format!(
                "password must be at most {MAX_PASSWORD_BYTES} bytes"
            )));
        }
        Ok(Registration {
            name: name.to_string(),
            email: email.to_string(),
            password: self.password,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MeResponse {
    pub email: String,
    pub name: String,
    pub authenticated: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateResponse {
    pub state: String,
}

/// OAuth callback query string.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CallbackQuery {
    pub code: Option<String>,
    pub state: Option<String>,
}

/// File size as sent by clients: a JSON number or a decimal string.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum FileSize {
    Number(i64),
    Text(String),
}

impl FileSize {
    pub fn parse(&self) -> Result<i64, AppError> {
        match self {
            FileSize::Number(n) => Ok(*n),
            FileSize::Text(s) => s
                .trim()
                .parse::<i64>()
                .map_err(|_| AppError::Validation("file_size must be an integer".into())),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct StartUploadRequest {
    pub file_size: FileSize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilesResponse {
    pub files: Vec<FileRecord>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub user_store: bool,
    pub breakers: Vec<BreakerHealth>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BreakerHealth {
    pub name: String,
    pub state: String,
}
