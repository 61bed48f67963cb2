//! Shared fixtures for router-level tests: in-memory stores, a stub OAuth
//! provider and a scriptable uploader.

#![allow(dead_code)]

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use axum::Router;
use axum::body::Body;
use axum::extract::ConnectInfo;
use axum::http::{Request, Response, header};
use chrono::{TimeZone, Utc};
use tower::ServiceExt;
use upgate_api::config::{ApiConfig, Environment};
use upgate_api::services::rate_limit::RateLimiter;
use upgate_api::{AppState, router};
use upgate_core::auth::AuthService;
use upgate_core::auth::jwt::TokenIssuer;
use upgate_core::auth::oauth::{OAuthError, OAuthProvider, OAuthProviders};
use upgate_core::breaker::BreakerSettings;
use upgate_core::models::auth::OAuthIdentity;
use upgate_core::models::uploads::{FileRecord, UploadSession, UploadStatus};
use upgate_core::store::{MemoryRateCounter, MemoryStateStore, MemoryUserStore};
use upgate_core::uploads::{FilesService, RpcError, UploaderClient, UploadsService};

pub const FRONTEND_URL: &str = "http://frontend.test";
pub const GOOD_CODE: &str = "good-code";

pub fn test_config() -> ApiConfig {
    ApiConfig {
        bind_addr: "127.0.0.1:0".into(),
        environment: Environment::Test,
        frontend_url: FRONTEND_URL.into(),
        jwt_access_secret: "access-test-secret".into(),
        jwt_refresh_secret: "refresh-test-secret".into(),
        cors_origins: vec![FRONTEND_URL.into()],
        github: None,
        google: None,
        uploader_url: "http://uploader.test".into(),
        rate_limit_per_minute: 1000,
        trusted_proxies: Vec::new(),
    }
}

/// OAuth provider that accepts [`GOOD_CODE`] and returns a fixed identity.
pub struct StubProvider {
    pub identity: OAuthIdentity,
    pub exchanges: AtomicUsize,
}

impl StubProvider {
    pub fn new(email: &str) -> Self {
        Self {
            identity: OAuthIdentity {
                name: "Octo Cat".into(),
                email: email.into(),
                email_verified: true,
                provider: "stub".into(),
                provider_id: "42".into(),
                avatar_url: String::new(),
                username: "octocat".into(),
            },
            exchanges: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl OAuthProvider for StubProvider {
    fn name(&self) -> &str {
        "stub"
    }

    async fn exchange_code(&self, code: &str) -> Result<String, OAuthError> {
        self.exchanges.fetch_add(1, Ordering::SeqCst);
        if code == GOOD_CODE {
            Ok("provider-token".into())
        } else {
            Err(OAuthError::Rejected {
                provider: "stub".into(),
                error: "bad_verification_code".into(),
                description: "The code passed is incorrect or expired.".into(),
            })
        }
    }

    async fn fetch_identity(&self, _access_token: &str) -> Result<OAuthIdentity, OAuthError> {
        Ok(self.identity.clone())
    }
}

/// Uploader whose health can be flipped; counts calls that reach it.
#[derive(Default)]
pub struct FakeUploader {
    pub down: AtomicBool,
    pub calls: AtomicUsize,
}

impl FakeUploader {
    fn enter(&self) -> Result<(), RpcError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.down.load(Ordering::SeqCst) {
            return Err(RpcError::Unavailable("connection refused".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl UploaderClient for FakeUploader {
    async fn start_upload(&self, email: &str, file_size: u64) -> Result<UploadSession, RpcError> {
        self.enter()?;
        if file_size > 1024 * 1024 * 1024 {
            return Err(RpcError::ResourceExhausted("quota".into()));
        }
        Ok(UploadSession {
            upload_id: format!("up-{email}"),
            total_chunks: file_size.div_ceil(1024) as u32,
            upload_urls: vec!["http://uploader.test/chunk/0".into()],
        })
    }

    async fn upload_status(&self, upload_id: &str) -> Result<UploadStatus, RpcError> {
        self.enter()?;
        if upload_id == "missing" {
            return Err(RpcError::NotFound(upload_id.into()));
        }
        Ok(UploadStatus {
            status: "in_progress".into(),
            progress: 0.5,
            message: String::new(),
        })
    }

    async fn list_files(&self, email: &str) -> Result<Vec<FileRecord>, RpcError> {
        self.enter()?;
        Ok(vec![FileRecord {
            file_id: "file-1".into(),
            upload_id: "up-1".into(),
            owner_email: email.into(),
            size: 2048,
            total_chunks: 2,
            checksum: "abc123".into(),
            created_at: Utc.with_ymd_and_hms(2026, 1, 2, 3, 4, 5).unwrap(),
        }])
    }
}

pub struct TestApp {
    pub router: Router,
    pub users: Arc<MemoryUserStore>,
    pub provider: Arc<StubProvider>,
    pub uploader: Arc<FakeUploader>,
}

pub struct TestAppBuilder {
    config: ApiConfig,
    breaker: Option<BreakerSettings>,
}

impl TestAppBuilder {
    pub fn rate_limit(mut self, per_minute: u32) -> Self {
        self.config.rate_limit_per_minute = per_minute;
        self
    }

    pub fn trusted_proxies(mut self, proxies: &[&str]) -> Self {
        self.config.trusted_proxies = proxies.iter().map(|p| p.parse().unwrap()).collect();
        self
    }

    /// Use `settings` (renamed per operation) for every breaker.
    pub fn breaker(mut self, settings: BreakerSettings) -> Self {
        self.breaker = Some(settings);
        self
    }

    pub fn build(self) -> TestApp {
        let config = self.config;
        let users = Arc::new(MemoryUserStore::new());
        let states = Arc::new(MemoryStateStore::new());
        let tokens = TokenIssuer::new(
            config.jwt_access_secret.as_bytes(),
            config.jwt_refresh_secret.as_bytes(),
        )
        .unwrap();
        let auth = AuthService::new(users.clone(), states, tokens);

        let provider = Arc::new(StubProvider::new("octo@example.com"));
        let providers = OAuthProviders::new().with(provider.clone());

        let uploader = Arc::new(FakeUploader::default());
        let (uploads, files) = match self.breaker {
            Some(settings) => {
                let named = |name: &str| {
                    let mut s = settings.clone();
                    s.name = name.to_string();
                    s
                };
                (
                    UploadsService::with_breakers(
                        uploader.clone(),
                        named("uploads.start"),
                        named("uploads.status"),
                    ),
                    FilesService::with_breaker(uploader.clone(), named("files.list")),
                )
            }
            None => (
                UploadsService::new(uploader.clone()),
                FilesService::new(uploader.clone()),
            ),
        };

        let rate_limiter = RateLimiter::per_minute(
            Arc::new(MemoryRateCounter::new()),
            u64::from(config.rate_limit_per_minute),
        );

        let state = AppState {
            auth,
            uploads,
            files,
            providers,
            users: users.clone(),
            rate_limiter,
            config,
        };

        TestApp {
            router: router(state),
            users,
            provider,
            uploader,
        }
    }
}

impl TestApp {
    pub fn builder() -> TestAppBuilder {
        TestAppBuilder {
            config: test_config(),
            breaker: None,
        }
    }

    pub fn new() -> Self {
        Self::builder().build()
    }

    pub async fn send(&self, request: Request<Body>) -> Response<Body> {
        self.router.clone().oneshot(request).await.unwrap()
    }

    /// Register then log in; returns the session cookies.
    pub async fn signed_in(&self, email: &str) -> HashMap<String, String> {
        let resp = self
            .send(json_request(
                "POST",
                "/auth/register",
                serde_json::json!({"name": "Ada", "email": email, "password": "hunter22"}),
                &[],
            ))
            .await;
        assert_eq!(resp.status(), 201);

        let resp = self
            .send(json_request(
                "POST",
                "/auth/login",
                serde_json::json!({"email": email, "password": "hunter22"}),
                &[],
            ))
            .await;
        assert_eq!(resp.status(), 200);
        set_cookies(&resp)
    }
}

fn cookie_header(cookies: &[(&str, &str)]) -> String {
    cookies
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("; ")
}

pub fn json_request(
    method: &str,
    uri: &str,
    body: serde_json::Value,
    cookies: &[(&str, &str)],
) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if !cookies.is_empty() {
        builder = builder.header(header::COOKIE, cookie_header(cookies));
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

pub fn empty_request(method: &str, uri: &str, cookies: &[(&str, &str)]) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if !cookies.is_empty() {
        builder = builder.header(header::COOKIE, cookie_header(cookies));
    }
    builder.body(Body::empty()).unwrap()
}

/// `name -> value` of every `Set-Cookie` header.
pub fn set_cookies(resp: &Response<Body>) -> HashMap<String, String> {
    raw_set_cookies(resp)
        .iter()
        .filter_map(|raw| {
            let pair = raw.split(';').next()?;
            let (name, value) = pair.split_once('=')?;
            Some((name.trim().to_string(), value.trim().to_string()))
        })
        .collect()
}

pub fn raw_set_cookies(resp: &Response<Body>) -> Vec<String> {
    resp.headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .map(str::to_string)
        .collect()
}

pub async fn body_json(resp: Response<Body>) -> serde_json::Value {
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

/// `GET /health` arriving from socket peer `peer`, optionally with an
/// `X-Forwarded-For` header.
pub fn health_from(peer: &str, forwarded_for: Option<&str>) -> Request<Body> {
    let addr = SocketAddr::new(peer.parse::<IpAddr>().unwrap(), 40000);
    let mut builder = Request::builder()
        .uri("/health")
        .extension(ConnectInfo(addr));
    if let Some(xff) = forwarded_for {
        builder = builder.header("x-forwarded-for", xff);
    }
    builder.body(Body::empty()).unwrap()
}

pub fn fast_breaker() -> BreakerSettings {
    BreakerSettings::new("test")
        .with_failure_threshold(2)
        .with_cooldown(Duration::from_secs(60))
}
