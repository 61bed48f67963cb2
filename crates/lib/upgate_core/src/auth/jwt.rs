//! JWT token generation and verification.
//!
//! Access and refresh tokens are signed with distinct HS256 secrets. Every
//! token carries its class in `typ` and a random `jti`, so two tokens minted
//! in the same second for the same subject still differ.

use std::path::{Path, PathBuf};

use chrono::{Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use rand::distr::Alphanumeric;
use rand::{Rng, rng};
use tracing::{info, warn};

use super::{AuthError, AuthErrorKind};
use crate::models::auth::{TokenClaims, TokenClass, TokenPair};
use crate::uuid::new_id;

/// `iss` claim on every token.
pub const ISSUER: &str = "upgate";

/// Access token lifetime: 30 minutes.
pub const ACCESS_TOKEN_TTL_SECS: i64 = 30 * 60;

/// Refresh token lifetime: 30 days.
pub const REFRESH_TOKEN_TTL_SECS: i64 = 30 * 24 * 60 * 60;

#[derive(Clone)]
struct ClassKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: Duration,
}

impl ClassKeys {
    fn new(secret: &[u8], ttl_secs: i64) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            ttl: Duration::seconds(ttl_secs),
        }
    }
}

/// Issues and validates access/refresh tokens.
#[derive(Clone)]
pub struct TokenIssuer {
    access: ClassKeys,
    refresh: ClassKeys,
    validation: Validation,
}

impl TokenIssuer {
    /// Build an issuer from the two signing secrets. They must be non-empty
    /// and different from each other.
    pub fn new(access_secret: &[u8], refresh_secret: &[u8]) -> Result<Self, AuthError> {
        if access_secret.is_empty() || refresh_secret.is_empty() {
            return Err(AuthError::internal("token secrets must not be empty"));
        }
        if access_secret == refresh_secret {
            return Err(AuthError::internal(
                "access and refresh token secrets must differ",
            ));
        }

        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.set_issuer(&[ISSUER]);
        validation.set_required_spec_claims(&["exp", "iss", "sub"]);

        Ok(Self {
            access: ClassKeys::new(access_secret, ACCESS_TOKEN_TTL_SECS),
            refresh: ClassKeys::new(refresh_secret, REFRESH_TOKEN_TTL_SECS),
            validation,
        })
    }

    fn keys(&self, class: TokenClass) -> &ClassKeys {
        match class {
            TokenClass::Access => &self.access,
            TokenClass::Refresh => &self.refresh,
        }
    }

    /// Mint a token of `class` for `subject` (the user's email).
    pub fn issue(&self, subject: &str, class: TokenClass) -> Result<String, AuthError> {
        let now = Utc::now();
        let claims = TokenClaims {
            iss: ISSUER.to_string(),
            sub: subject.to_string(),
            iat: now.timestamp(),
            exp: (now + self.keys(class).ttl).timestamp(),
            typ: class,
            jti: new_id(),
        };
        self.sign(&claims)
    }

    pub fn issue_access_token(&self, subject: &str) -> Result<String, AuthError> {
        self.issue(subject, TokenClass::Access)
    }

    pub fn issue_refresh_token(&self, subject: &str) -> Result<String, AuthError> {
        self.issue(subject, TokenClass::Refresh)
    }

    /// Mint a fresh access + refresh pair.
    pub fn issue_pair(&self, subject: &str) -> Result<TokenPair, AuthError> {
        Ok(TokenPair {
            access_token: self.issue_access_token(subject)?,
            refresh_token: self.issue_refresh_token(subject)?,
        })
    }

    /// Verify `token` with the secret for `expected` and check its class.
    pub fn validate(&self, token: &str, expected: TokenClass) -> Result<TokenClaims, AuthError> {
        let data = decode::<TokenClaims>(token, &self.keys(expected).decoding, &self.validation)
            .map_err(|e| AuthError::invalid_token("invalid or expired token").with_source(e))?;

        if data.claims.typ != expected {
            return Err(AuthError::new(
                AuthErrorKind::InvalidTokenType,
                format!("expected {expected} token, got {}", data.claims.typ),
            ));
        }
        Ok(data.claims)
    }

    fn sign(&self, claims: &TokenClaims) -> Result<String, AuthError> {
        encode(
            &Header::new(Algorithm::HS256),
            claims,
            &self.keys(claims.typ).encoding,
        )
        .map_err(|e| AuthError::new(AuthErrorKind::TokenSignature, "jwt encode").with_source(e))
    }
}

/// Signing secret persisted as `file_name` under the user data dir.
///
/// Used when no secret is configured. A missing or empty file gets a fresh
/// 64-character secret written to it.
pub fn persisted_secret(file_name: &str) -> String {
    load_or_create_secret(&secret_path(file_name))
}

fn load_or_create_secret(path: &Path) -> String {
    if let Ok(existing) = std::fs::read_to_string(path) {
        let trimmed = existing.trim();
        if !trimmed.is_empty() {
            return trimmed.to_string();
        }
    }

    let secret: String = rng()
        .sample_iter(&Alphanumeric)
        .take(64)
        .map(char::from)
        .collect();
    let written = path
        .parent()
        .map_or(Ok(()), std::fs::create_dir_all)
        .and_then(|()| std::fs::write(path, &secret));
    match written {
        Ok(()) => info!(path = %path.display(), "generated new token secret"),
        Err(e) => warn!(
            error = %e,
            path = %path.display(),
            "could not persist token secret; sessions will not survive a restart"
        ),
    }
    secret
}

fn secret_path(file_name: &str) -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("upgate")
        .join(file_name)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn issuer() -> TokenIssuer {
        TokenIssuer::new(b"access-secret-for-tests", b"refresh-secret-for-tests").unwrap()
    }

    #[test]
    fn access_token_round_trips() {
        let issuer = issuer();
        let token = issuer.issue_access_token("a@b.com").unwrap();
        let claims = issuer.validate(&token, TokenClass::Access).unwrap();
        assert_eq!(claims.sub, "a@b.com");
        assert_eq!(claims.iss, ISSUER);
        assert_eq!(claims.typ, TokenClass::Access);
        assert_eq!(claims.exp - claims.iat, ACCESS_TOKEN_TTL_SECS);
    }

    #[test]
    fn refresh_token_lives_thirty_days() {
        let issuer = issuer();
        let token = issuer.issue_refresh_token("a@b.com").unwrap();
        let claims = issuer.validate(&token, TokenClass::Refresh).unwrap();
        assert_eq!(claims.exp - claims.iat, REFRESH_TOKEN_TTL_SECS);
    }

    #[test]
    fn refresh_token_is_not_an_access_token() {
        let issuer = issuer();
        let pair = issuer.issue_pair("a@b.com").unwrap();
        assert!(issuer.validate(&pair.refresh_token, TokenClass::Access).is_err());
        assert!(issuer.validate(&pair.access_token, TokenClass::Refresh).is_err());
    }

    #[test]
    fn wrong_class_under_right_secret_is_invalid_token_type() {
        let issuer = issuer();
        let now = Utc::now().timestamp();
        // Refresh-class claims signed with the access secret.
        let claims = TokenClaims {
            iss: ISSUER.into(),
            sub: "a@b.com".into(),
            iat: now,
            exp: now + 60,
            typ: TokenClass::Refresh,
            jti: new_id(),
        };
        let token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &issuer.access.encoding,
        )
        .unwrap();
        let err = issuer.validate(&token, TokenClass::Access).unwrap_err();
        assert!(err.is_invalid_token_type());
    }

    #[test]
    fn expired_token_is_rejected() {
        let issuer = issuer();
        let now = Utc::now().timestamp();
        let claims = TokenClaims {
            iss: ISSUER.into(),
            sub: "a@b.com".into(),
            iat: now - 120,
            exp: now - 1,
            typ: TokenClass::Access,
            jti: new_id(),
        };
        let token = issuer.sign(&claims).unwrap();
        let err = issuer.validate(&token, TokenClass::Access).unwrap_err();
        assert!(err.is_invalid_token());
    }

    #[test]
    fn foreign_issuer_is_rejected() {
        let issuer = issuer();
        let now = Utc::now().timestamp();
        let claims = TokenClaims {
            iss: "someone-else".into(),
            sub: "a@b.com".into(),
            iat: now,
            exp: now + 60,
            typ: TokenClass::Access,
            jti: new_id(),
        };
        let token = issuer.sign(&claims).unwrap();
        assert!(issuer.validate(&token, TokenClass::Access).is_err());
    }

    #[test]
    fn tampered_and_garbage_tokens_are_rejected() {
        let issuer = issuer();
        let token = issuer.issue_access_token("a@b.com").unwrap();
        let other = TokenIssuer::new(b"another-access", b"another-refresh").unwrap();
        assert!(other.validate(&token, TokenClass::Access).is_err());
        assert!(issuer.validate("not-a-jwt", TokenClass::Access).is_err());
        assert!(issuer.validate("", TokenClass::Access).is_err());
    }

    #[test]
    fn two_tokens_for_same_subject_differ() {
        let issuer = issuer();
        let a = issuer.issue_access_token("a@b.com").unwrap();
        let b = issuer.issue_access_token("a@b.com").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn generated_secret_is_persisted_and_reused() {
        let dir = std::env::temp_dir().join(format!("upgate-secret-{}", new_id()));
        let path = dir.join("nested").join("jwt-access-secret");
        let first = load_or_create_secret(&path);
        assert_eq!(first.len(), 64);
        assert_eq!(load_or_create_secret(&path), first);
        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn unwritable_location_still_yields_a_secret() {
        let blocker = std::env::temp_dir().join(format!("upgate-blocker-{}", new_id()));
        std::fs::write(&blocker, "").unwrap();
        let path = blocker.join("jwt-access-secret");
        let a = load_or_create_secret(&path);
        let b = load_or_create_secret(&path);
        assert_eq!(a.len(), 64);
        assert_ne!(a, b);
        std::fs::remove_file(&blocker).unwrap();
    }

    #[test]
    fn equal_or_empty_secrets_are_refused() {
        assert!(TokenIssuer::new(b"same", b"same").is_err());
        assert!(TokenIssuer::new(b"", b"refresh").is_err());
    }
}
