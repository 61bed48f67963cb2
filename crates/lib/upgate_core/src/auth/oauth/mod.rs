//! OAuth2 authorization-code providers.
//!
//! Each vendor implements [`OAuthProvider`]: exchange a callback `code` for a
//! provider access token, then resolve a normalized [`OAuthIdentity`].
//! Providers are looked up by name through [`OAuthProviders`].

pub mod github;
pub mod google;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use thiserror::Error;

use crate::models::auth::OAuthIdentity;

pub use github::GitHubProvider;
pub use google::GoogleProvider;

/// Outbound request timeout for vendor APIs.
const HTTP_TIMEOUT: Duration = Duration::from_secs(10);

/// Errors talking to an OAuth vendor.
#[derive(Debug, Error)]
pub enum OAuthError {
    #[error("{provider} rejected the code: {error} - {description}")]
    Rejected {
        provider: String,
        error: String,
        description: String,
    },

    #[error("{0} returned an empty access token")]
    EmptyToken(String),

    #[error("identity unavailable: {0}")]
    Identity(String),

    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("unexpected status {status}: {body}")]
    Status { status: u16, body: String },
}

/// Client credentials and endpoints for one vendor.
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
    /// Code exchange endpoint.
    pub token_url: String,
    /// Base URL for identity lookups.
    pub api_url: String,
}

/// A third-party identity provider.
#[async_trait]
pub trait OAuthProvider: Send + Sync {
    /// Route segment and stored `provider` value, e.g. `github`.
    fn name(&self) -> &str;

    /// Exchange an authorization code for a provider access token.
    async fn exchange_code(&self, code: &str) -> Result<String, OAuthError>;

    /// Resolve the identity behind a provider access token.
    async fn fetch_identity(&self, access_token: &str) -> Result<OAuthIdentity, OAuthError>;
}

/// Registered providers keyed by name.
#[derive(Clone, Default)]
pub struct OAuthProviders {
    providers: HashMap<String, Arc<dyn OAuthProvider>>,
}

impl OAuthProviders {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, provider: Arc<dyn OAuthProvider>) {
        self.providers.insert(provider.name().to_string(), provider);
    }

    pub fn with(mut self, provider: Arc<dyn OAuthProvider>) -> Self {
        self.register(provider);
        self
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn OAuthProvider>> {
        self.providers.get(name).cloned()
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.providers.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}

/// Token endpoint reply. Vendors report failures in-band with `error`.
#[derive(Debug, Default, Deserialize)]
struct TokenResponse {
    #[serde(default)]
    access_token: String,
    #[serde(default)]
    error: String,
    #[serde(default)]
    error_description: String,
}

impl TokenResponse {
    fn into_access_token(self, provider: &str) -> Result<String, OAuthError> {
        if !self.error.is_empty() {
            return Err(OAuthError::Rejected {
                provider: provider.to_string(),
                error: self.error,
                description: self.error_description,
            });
        }
        if self.access_token.is_empty() {
            return Err(OAuthError::EmptyToken(provider.to_string()));
        }
        Ok(self.access_token)
    }
}

/// JSON-over-HTTP helper shared by the vendor adapters.
#[derive(Clone)]
struct VendorClient {
    http: reqwest::Client,
}

impl VendorClient {
    fn new() -> Result<Self, OAuthError> {
        let http = reqwest::Client::builder()
            .timeout(HTTP_TIMEOUT)
            .user_agent(concat!("upgate/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { http })
    }

    /// POST a form and decode the JSON reply.
    async fn post_form_json<T: DeserializeOwned>(
        &self,
        url: &str,
        form: &[(&str, &str)],
    ) -> Result<T, OAuthError> {
        let resp = self
            .http
            .post(url)
            .header(reqwest::header::ACCEPT, "application/json")
            .form(form)
            .send()
            .await?;
        Self::decode(resp).await
    }

    /// GET with a bearer token and decode the JSON reply.
    async fn get_json_with_token<T: DeserializeOwned>(
        &self,
        url: &str,
        token: &str,
    ) -> Result<T, OAuthError> {
        let resp = self
            .http
            .get(url)
            .header(reqwest::header::ACCEPT, "application/json")
            .bearer_auth(token)
            .send()
            .await?;
        Self::decode(resp).await
    }

    async fn decode<T: DeserializeOwned>(resp: reqwest::Response) -> Result<T, OAuthError> {
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(OAuthError::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(resp.json::<T>().await?)
    }
}
