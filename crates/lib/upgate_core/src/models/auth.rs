//! Authentication domain models.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::uuid::new_id;

/// Persisted user record. `email` is the natural key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: String,
    pub email: String,
    pub name: String,
    /// bcrypt hash; empty for users created through an OAuth provider.
    pub password_hash: String,
    /// Base64 salt used to produce `password_hash`; empty for OAuth users.
    pub password_salt: String,
    pub provider: Option<String>,
    pub provider_id: Option<String>,
    pub verified: bool,
}

impl User {
    /// Build a locally registered user with a fresh id.
    pub fn local(name: &str, email: &str, password_hash: String, password_salt: String) -> Self {
        Self {
            id: new_id(),
            email: email.to_string(),
            name: name.to_string(),
            password_hash,
            password_salt,
            provider: None,
            provider_id: None,
            verified: false,
        }
    }

    /// Build a user from a provider identity. No usable password.
    pub fn from_identity(identity: &OAuthIdentity) -> Self {
        Self {
            id: new_id(),
            email: identity.email.clone(),
            name: identity.display_name().to_string(),
            password_hash: String::new(),
            password_salt: String::new(),
            provider: Some(identity.provider.clone()),
            provider_id: Some(identity.provider_id.clone()),
            verified: true,
        }
    }

    /// Whether the record can authenticate with a local password.
    pub fn has_password(&self) -> bool {
        !self.password_hash.is_empty()
    }
}

/// Registration input after request validation.
#[derive(Debug, Clone)]
pub struct Registration {
    pub name: String,
    pub email: String,
    pub password: String,
}

/// Token class, embedded in every token as `typ`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenClass {
    Access,
    Refresh,
}

impl TokenClass {
    pub fn as_str(self) -> &'static str {
        match self {
            TokenClass::Access => "access",
            TokenClass::Refresh => "refresh",
        }
    }
}

impl fmt::Display for TokenClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// JWT claims carried by access and refresh tokens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenClaims {
    /// Issuer, always `upgate`.
    pub iss: String,
    /// Subject: the user's email.
    pub sub: String,
    /// Issued at (unix timestamp).
    pub iat: i64,
    /// Expiry (unix timestamp).
    pub exp: i64,
    /// Token class.
    pub typ: TokenClass,
    /// Unique token id.
    pub jti: String,
}

/// A freshly minted access + refresh token pair.
#[derive(Debug, Clone)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

/// Identity resolved from an OAuth provider, normalized across vendors.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct OAuthIdentity {
    pub name: String,
    pub email: String,
    pub email_verified: bool,
    pub provider: String,
    pub provider_id: String,
    pub avatar_url: String,
    pub username: String,
}

impl OAuthIdentity {
    /// Name to store on a new user: the profile name, else the username.
    pub fn display_name(&self) -> &str {
        if self.name.is_empty() {
            &self.username
        } else {
            &self.name
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_class_serializes_lowercase() {
        let json = serde_json::to_string(&TokenClass::Refresh).unwrap();
        assert_eq!(json, "\"refresh\"");
        let back: TokenClass = serde_json::from_str("\"access\"").unwrap();
        assert_eq!(back, TokenClass::Access);
    }

    #[test]
    fn oauth_user_is_verified_without_password() {
        let identity = OAuthIdentity {
            name: String::new(),
            email: "octo@example.com".into(),
            email_verified: true,
            provider: "github".into(),
            provider_id: "42".into(),
            avatar_url: String::new(),
            username: "octocat".into(),
        };
        let user = User::from_identity(&identity);
        assert!(user.verified);
        assert!(!user.has_password());
        assert_eq!(user.name, "octocat");
        assert_eq!(user.provider.as_deref(), Some("github"));
        assert_eq!(user.provider_id.as_deref(), Some("42"));
    }

    #[test]
    fn local_user_has_no_provider() {
        let user = User::local("T", "t@x.com", "hash".into(), "salt".into());
        assert!(user.provider.is_none());
        assert!(!user.verified);
        assert!(user.has_password());
    }
}
