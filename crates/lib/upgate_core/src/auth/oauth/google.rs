//! Google OAuth adapter.

use async_trait::async_trait;
use serde::Deserialize;

use super::{OAuthError, OAuthProvider, ProviderConfig, TokenResponse, VendorClient};
use crate::models::auth::OAuthIdentity;

pub const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
pub const GOOGLE_API_URL: &str = "https://www.googleapis.com";

/// `/oauth2/v3/userinfo` payload.
#[derive(Debug, Default, Deserialize)]
pub struct GoogleUserInfo {
    #[serde(default)]
    pub sub: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub email_verified: bool,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub picture: String,
}

/// Normalize userinfo. Requires a subject, an email and a verified email.
pub fn identity_from_userinfo(info: GoogleUserInfo) -> Result<OAuthIdentity, OAuthError> {
    if info.sub.is_empty() {
        return Err(OAuthError::Identity("google response missing user id".into()));
    }
    if info.email.is_empty() {
        return Err(OAuthError::Identity("google response missing email".into()));
    }
    if !info.email_verified {
        return Err(OAuthError::Identity(format!(
            "email {} not verified by google",
            info.email
        )));
    }
    Ok(OAuthIdentity {
        username: info.name.clone(),
        name: info.name,
        email: info.email,
        email_verified: true,
        provider: "google".to_string(),
        provider_id: info.sub,
        avatar_url: info.picture,
    })
}

pub struct GoogleProvider {
    config: ProviderConfig,
    client: VendorClient,
}

impl GoogleProvider {
    pub fn new(config: ProviderConfig) -> Result<Self, OAuthError> {
        Ok(Self {
            config,
            client: VendorClient::new()?,
        })
    }

    /// Config with the public Google endpoints.
    pub fn config(client_id: String, client_secret: String, redirect_uri: String) -> ProviderConfig {
        ProviderConfig {
            client_id,
            client_secret,
            redirect_uri,
            token_url: GOOGLE_TOKEN_URL.to_string(),
            api_url: GOOGLE_API_URL.to_string(),
        }
    }
}

#[async_trait]
impl OAuthProvider for GoogleProvider {
    fn name(&self) -> &str {
        "google"
    }

    async fn exchange_code(&self, code: &str) -> Result<String, OAuthError> {
        let form = [
            ("client_id", self.config.client_id.as_str()),
            ("client_secret", self.config.client_secret.as_str()),
            ("code", code),
            ("redirect_uri", self.config.redirect_uri.as_str()),
            ("grant_type", "authorization_code"),
        ];
        let resp: TokenResponse = self
            .client
            .post_form_json(&self.config.token_url, &form)
            .await?;
        resp.into_access_token(self.name())
    }

    async fn fetch_identity(&self, access_token: &str) -> Result<OAuthIdentity, OAuthError> {
        let info: GoogleUserInfo = self
            .client
            .get_json_with_token(
                &format!("{}/oauth2/v3/userinfo", self.config.api_url),
                access_token,
            )
            .await?;
        identity_from_userinfo(info)
    }
}
