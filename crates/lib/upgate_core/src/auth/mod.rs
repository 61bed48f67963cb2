//! Authentication and authorization logic.
//!
//! Provides password hashing, token issuance/validation, OAuth state and
//! provider adapters, and the [`AuthService`] that orchestrates them.

pub mod jwt;
pub mod oauth;
pub mod password;
pub mod service;
pub mod state;

use std::fmt;

use thiserror::Error;

use crate::store::StoreError;

pub use service::{AuthService, LoginResponse};

/// Boxed underlying cause carried by [`AuthError`].
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// What went wrong, independent of the underlying cause.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthErrorKind {
    InvalidCredentials,
    UserNotFound,
    UserAlreadyExists,
    InvalidToken,
    InvalidTokenType,
    TokenSignature,
    InvalidState,
    OAuthProvider,
    Internal,
}

impl AuthErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            AuthErrorKind::InvalidCredentials => "invalid_credentials",
            AuthErrorKind::UserNotFound => "user_not_found",
            AuthErrorKind::UserAlreadyExists => "user_already_exists",
            AuthErrorKind::InvalidToken => "invalid_token",
            AuthErrorKind::InvalidTokenType => "invalid_token_type",
            AuthErrorKind::TokenSignature => "token_signature",
            AuthErrorKind::InvalidState => "invalid_state",
            AuthErrorKind::OAuthProvider => "oauth_provider",
            AuthErrorKind::Internal => "internal",
        }
    }
}

impl fmt::Display for AuthErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Authentication error: a kind, a human-readable message and an optional cause.
#[derive(Debug, Error)]
#[error("{kind}: {message}")]
pub struct AuthError {
    kind: AuthErrorKind,
    message: String,
    #[source]
    source: Option<BoxError>,
}

impl AuthError {
    pub fn new(kind: AuthErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            source: None,
        }
    }

    /// Attach the underlying cause.
    pub fn with_source(mut self, source: impl Into<BoxError>) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn kind(&self) -> AuthErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn invalid_credentials() -> Self {
        Self::new(AuthErrorKind::InvalidCredentials, "invalid credentials")
    }

    pub fn user_not_found() -> Self {
        Self::new(AuthErrorKind::UserNotFound, "user not found")
    }

    pub fn invalid_token(message: impl Into<String>) -> Self {
        Self::new(AuthErrorKind::InvalidToken, message)
    }

    pub fn invalid_state(message: impl Into<String>) -> Self {
        Self::new(AuthErrorKind::InvalidState, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(AuthErrorKind::Internal, message)
    }

    pub fn is_invalid_credentials(&self) -> bool {
        self.kind == AuthErrorKind::InvalidCredentials
    }

    pub fn is_user_not_found(&self) -> bool {
        self.kind == AuthErrorKind::UserNotFound
    }

    pub fn is_user_already_exists(&self) -> bool {
        self.kind == AuthErrorKind::UserAlreadyExists
    }

    pub fn is_invalid_token(&self) -> bool {
        self.kind == AuthErrorKind::InvalidToken
    }

    pub fn is_invalid_token_type(&self) -> bool {
        self.kind == AuthErrorKind::InvalidTokenType
    }

    pub fn is_invalid_state(&self) -> bool {
        self.kind == AuthErrorKind::InvalidState
    }

    pub fn is_oauth_provider(&self) -> bool {
        self.kind == AuthErrorKind::OAuthProvider
    }

    /// Signing or storage failure; never shown to clients in detail.
    pub fn is_internal(&self) -> bool {
        matches!(
            self.kind,
            AuthErrorKind::Internal | AuthErrorKind::TokenSignature
        )
    }
}

impl From<StoreError> for AuthError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Conflict => {
                AuthError::new(AuthErrorKind::UserAlreadyExists, "user already exists")
            }
            other => AuthError::internal("store failure").with_source(other),
        }
    }
}

impl From<oauth::OAuthError> for AuthError {
    fn from(e: oauth::OAuthError) -> Self {
        AuthError::new(
            AuthErrorKind::OAuthProvider,
            "could not authenticate with provider",
        )
        .with_source(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn store_conflict_maps_to_already_exists() {
        let err = AuthError::from(StoreError::Conflict);
        assert!(err.is_user_already_exists());
    }

    #[test]
    fn store_backend_failure_is_internal_with_source() {
        let err = AuthError::from(StoreError::Backend("connection reset".into()));
        assert!(err.is_internal());
        assert!(err.source().is_some());
        assert_eq!(err.to_string(), "internal: store failure");
    }

    #[test]
    fn predicates_match_only_their_kind() {
        let err = AuthError::invalid_token("expired");
        assert!(err.is_invalid_token());
        assert!(!err.is_invalid_token_type());
        assert!(!err.is_internal());
        assert_eq!(err.kind(), AuthErrorKind::InvalidToken);
        assert_eq!(err.message(), "expired");
    }
}
