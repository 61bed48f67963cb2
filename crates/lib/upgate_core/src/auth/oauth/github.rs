//! GitHub OAuth adapter.
//!
//! Identity comes from `GET /user`. Accounts with a private email return no
//! address there, so `GET /user/emails` is consulted: primary and verified
//! first, then any verified address.

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use super::{OAuthError, OAuthProvider, ProviderConfig, TokenResponse, VendorClient};
use crate::models::auth::OAuthIdentity;

pub const GITHUB_TOKEN_URL: &str = "https://github.com/login/oauth/access_token";
pub const GITHUB_API_URL: &str = "https://api.github.com";

#[derive(Debug, Deserialize)]
struct GitHubUser {
    id: i64,
    login: String,
    email: Option<String>,
    name: Option<String>,
    avatar_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GitHubEmail {
    pub email: String,
    pub primary: bool,
    pub verified: bool,
}

/// Pick the address to use: primary+verified, else the first verified.
pub fn select_email(emails: &[GitHubEmail]) -> Option<&str> {
    emails
        .iter()
        .find(|e| e.primary && e.verified)
        .or_else(|| emails.iter().find(|e| e.verified))
        .map(|e| e.email.as_str())
}

pub struct GitHubProvider {
    config: ProviderConfig,
    client: VendorClient,
}

impl GitHubProvider {
    pub fn new(config: ProviderConfig) -> Result<Self, OAuthError> {
        Ok(Self {
            config,
            client: VendorClient::new()?,
        })
    }

    /// Config with the public GitHub endpoints.
    pub fn config(client_id: String, client_secret: String, redirect_uri: String) -> ProviderConfig {
        ProviderConfig {
            client_id,
            client_secret,
            redirect_uri,
            token_url: GITHUB_TOKEN_URL.to_string(),
            api_url: GITHUB_API_URL.to_string(),
        }
    }
}

#[async_trait]
impl OAuthProvider for GitHubProvider {
    fn name(&self) -> &str {
        "github"
    }

    async fn exchange_code(&self, code: &str) -> Result<String, OAuthError> {
        let form = [
            ("client_id", self.config.client_id.as_str()),
            ("client_secret", self.config.client_secret.as_str()),
            ("code", code),
            ("redirect_uri", self.config.redirect_uri.as_str()),
        ];
        let resp: TokenResponse = self
            .client
            .post_form_json(&self.config.token_url, &form)
            .await?;
        resp.into_access_token(self.name())
    }

    async fn fetch_identity(&self, access_token: &str) -> Result<OAuthIdentity, OAuthError> {
        let user: GitHubUser = self
            .client
            .get_json_with_token(&format!("{}/user", self.config.api_url), access_token)
            .await?;

        let mut identity = OAuthIdentity {
            name: user.name.unwrap_or_default(),
            email: user.email.unwrap_or_default(),
            email_verified: false,
            provider: self.name().to_string(),
            provider_id: user.id.to_string(),
            avatar_url: user.avatar_url.unwrap_or_default(),
            username: user.login,
        };

        if identity.email.is_empty() {
            debug!(login = %identity.username, "github profile has no public email");
            let emails: Vec<GitHubEmail> = self
                .client
                .get_json_with_token(
                    &format!("{}/user/emails", self.config.api_url),
                    access_token,
                )
                .await?;
            let email = select_email(&emails)
                .ok_or_else(|| OAuthError::Identity("no verified email found".into()))?;
            identity.email = email.to_string();
            identity.email_verified = true;
        }

        Ok(identity)
    }
}
