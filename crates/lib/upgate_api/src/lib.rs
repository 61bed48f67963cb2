//! # upgate_api
//!
//! HTTP API library for Upgate: auth and OAuth endpoints, upload/file
//! proxies, session cookies, rate limiting.

pub mod config;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;

use std::sync::Arc;

use axum::Router;
use axum::http::{HeaderValue, Method, header};
use axum::routing::{get, post};
use sqlx::PgPool;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::warn;
use upgate_core::auth::AuthService;
use upgate_core::auth::oauth::OAuthProviders;
use upgate_core::store::UserStore;
use upgate_core::uploads::{FilesService, UploadsService};

use crate::config::ApiConfig;
use crate::handlers::{auth, files, health, oauth, uploads};
use crate::services::rate_limit::RateLimiter;

/// Shared application state passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub auth: AuthService,
    pub uploads: UploadsService,
    pub files: FilesService,
    /// OAuth adapters keyed by the `{provider}` path segment.
    pub providers: OAuthProviders,
    /// Same store the auth service uses; probed by `/health`.
    pub users: Arc<dyn UserStore>,
    pub rate_limiter: RateLimiter,
    pub config: ApiConfig,
}

/// Run embedded database migrations.
pub async fn migrate(pool: &PgPool) -> Result<(), sqlx::migrate::MigrateError> {
    upgate_core::migrate::migrate(pool).await
}

fn cors_layer(config: &ApiConfig) -> CorsLayer {
    let origins: Vec<HeaderValue> = config
        .cors_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            // Credentialed CORS cannot use a wildcard origin.
            Ok(v) if v != "*" => Some(v),
            _ => {
                warn!(%origin, "ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([
            header::ORIGIN,
            header::CONTENT_TYPE,
            header::ACCEPT,
            header::AUTHORIZATION,
        ])
        .allow_credentials(true)
}

/// Builds the Axum router with all routes and shared state.
pub fn router(state: AppState) -> Router {
    // Public routes (no auth required)
    let public = Router::new()
        .route(routes::GET_HEALTH, get(health::health_handler))
        .route(routes::POST_AUTH_REGISTER, post(auth::register_handler))
        .route(routes::POST_AUTH_LOGIN, post(auth::login_handler))
        .route(routes::POST_AUTH_REFRESH, post(auth::refresh_handler))
        .route(routes::POST_AUTH_LOGOUT, post(auth::logout_handler))
        .route(routes::GET_AUTH_ME, get(auth::me_handler))
        .route(routes::POST_AUTH_STATE, post(auth::state_handler))
        .route(
            routes::GET_AUTH_PROVIDER_CALLBACK,
            get(oauth::callback_handler),
        );

    // Protected routes (require auth)
    let protected = Router::new()
        .route(
            routes::POST_UPLOADS_START,
            post(uploads::start_upload_handler),
        )
        .route(
            routes::GET_UPLOADS_ID_STATUS,
            get(uploads::upload_status_handler),
        )
        .route(routes::GET_FILES, get(files::list_files_handler))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::auth::require_auth,
        ));

    Router::new()
        .merge(public)
        .merge(protected)
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::rate_limit::rate_limit,
        ))
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(&state.config))
        .with_state(state)
}
