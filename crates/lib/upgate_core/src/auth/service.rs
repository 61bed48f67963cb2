//! Authentication service: local login/registration, token refresh, current
//! user resolution and the OAuth callback flow.

use std::sync::Arc;

use tracing::{debug, info, warn};

use super::jwt::TokenIssuer;
use super::oauth::OAuthProvider;
use super::state::{STATE_TTL, generate_state, state_key};
use super::{AuthError, AuthErrorKind, password};
use crate::models::auth::{OAuthIdentity, Registration, TokenClaims, TokenClass, TokenPair, User};
use crate::store::{StateStore, UserStore};

/// Result of a successful login: the session tokens plus the user record.
#[derive(Debug, Clone)]
pub struct LoginResponse {
    pub tokens: TokenPair,
    pub user: User,
}

/// Orchestrates credential checks, token issuance and OAuth logins.
///
/// Holds no mutable state of its own; clones share the same stores.
#[derive(Clone)]
pub struct AuthService {
    users: Arc<dyn UserStore>,
    states: Arc<dyn StateStore>,
    tokens: TokenIssuer,
}

impl AuthService {
    pub fn new(users: Arc<dyn UserStore>, states: Arc<dyn StateStore>, tokens: TokenIssuer) -> Self {
        Self {
            users,
            states,
            tokens,
        }
    }

    pub fn tokens(&self) -> &TokenIssuer {
        &self.tokens
    }

    // -----------------------------------------------------------------------
    // Local credentials
    // -----------------------------------------------------------------------

    /// Authenticate with email + password.
    ///
    /// Unknown email and wrong password fail identically.
    pub async fn login(&self, email: &str, password: &str) -> Result<LoginResponse, AuthError> {
        let Some(user) = self.users.find_by_email(email).await? else {
            debug!(%email, "login for unknown email");
            password::dummy_verify(password);
            return Err(AuthError::invalid_credentials());
        };

        if !password::verify(password, &user.password_hash, &user.password_salt) {
            debug!(%email, "login with wrong password");
            return Err(AuthError::invalid_credentials());
        }

        let tokens = self.tokens.issue_pair(&user.email)?;
        info!(%email, "user logged in");
        Ok(LoginResponse { tokens, user })
    }

    /// Register a local user. Duplicate emails fail with `UserAlreadyExists`.
    pub async fn register(&self, registration: Registration) -> Result<User, AuthError> {
        let (hash, salt) = password::hash_with_salt(&registration.password)?;
        let user = User::local(&registration.name, &registration.email, hash, salt);
        self.users.create(&user).await?;
        info!(email = %user.email, user_id = %user.id, "user registered");
        Ok(user)
    }

    /// Exchange a refresh token for a brand-new pair.
    pub async fn refresh(&self, refresh_token: &str) -> Result<TokenPair, AuthError> {
        let claims = self.tokens.validate(refresh_token, TokenClass::Refresh)?;
        let user = self
            .users
            .find_by_email(&claims.sub)
            .await?
            .ok_or_else(AuthError::user_not_found)?;
        self.tokens.issue_pair(&user.email)
    }

    /// Verify an access token without touching the user store.
    pub fn validate_access(&self, access_token: &str) -> Result<TokenClaims, AuthError> {
        self.tokens.validate(access_token, TokenClass::Access)
    }

    /// Resolve the user behind an access token.
    pub async fn current_user(&self, access_token: &str) -> Result<User, AuthError> {
        let claims = self.validate_access(access_token)?;
        self.users
            .find_by_email(&claims.sub)
            .await?
            .ok_or_else(AuthError::user_not_found)
    }

    // -----------------------------------------------------------------------
    // OAuth
    // -----------------------------------------------------------------------

    /// Issue and persist a fresh OAuth state nonce.
    pub async fn save_state(&self) -> Result<String, AuthError> {
        let state = generate_state();
        self.states.save(&state_key(&state), STATE_TTL).await?;
        Ok(state)
    }

    /// Consume a state nonce. Unknown, expired or reused nonces fail with `InvalidState`.
    pub async fn validate_state(&self, state: &str) -> Result<(), AuthError> {
        if self.states.take(&state_key(state)).await? {
            Ok(())
        } else {
            Err(AuthError::invalid_state("invalid state"))
        }
    }

    /// Complete an authorization-code callback and open a session.
    pub async fn oauth_login(
        &self,
        provider: &dyn OAuthProvider,
        code: Option<&str>,
        state: Option<&str>,
    ) -> Result<LoginResponse, AuthError> {
        let code = code.filter(|c| !c.is_empty()).ok_or_else(|| {
            AuthError::new(
                AuthErrorKind::OAuthProvider,
                "could not receive `code` from authorizing party",
            )
        })?;
        let state = state.filter(|s| !s.is_empty()).ok_or_else(|| {
            AuthError::invalid_state("could not receive `state` from authorizing party")
        })?;

        self.validate_state(state).await?;

        let provider_token = provider.exchange_code(code).await.map_err(|e| {
            warn!(provider = provider.name(), error = %e, "code exchange failed");
            AuthError::from(e)
        })?;
        let identity = provider.fetch_identity(&provider_token).await?;
        if identity.email.is_empty() {
            return Err(AuthError::new(
                AuthErrorKind::OAuthProvider,
                "provider returned no email",
            ));
        }

        let user = self.resolve_oauth_user(&identity).await?;
        let tokens = self.tokens.issue_pair(&user.email)?;
        info!(provider = provider.name(), email = %user.email, "oauth login");
        Ok(LoginResponse { tokens, user })
    }

    /// Reuse the account for this email, or create one from the identity.
    async fn resolve_oauth_user(&self, identity: &OAuthIdentity) -> Result<User, AuthError> {
        if let Some(existing) = self.users.find_by_email(&identity.email).await? {
            return Ok(existing);
        }

        let user = User::from_identity(identity);
        match self.users.create(&user).await {
            Ok(()) => {
                info!(email = %user.email, provider = %identity.provider, "oauth user created");
                Ok(user)
            }
            Err(e) => {
                let err = AuthError::from(e);
                if !err.is_user_already_exists() {
                    return Err(err);
                }
                // Lost a creation race: the winner's record is the account.
                self.users
                    .find_by_email(&identity.email)
                    .await?
                    .ok_or_else(|| AuthError::internal("user vanished after conflict"))
            }
        }
    }
}
