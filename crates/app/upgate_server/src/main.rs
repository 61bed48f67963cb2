//! Upgate API gateway server binary.
//!
//! Wires the stores, OAuth providers and downstream uploader client into
//! `upgate_api::router` and serves it until Ctrl-C.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use sqlx::postgres::PgPoolOptions;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use upgate_api::config::{ApiConfig, OAuthClientConfig};
use upgate_api::services::rate_limit::RateLimiter;
use upgate_api::AppState;
use upgate_core::auth::AuthService;
use upgate_core::auth::jwt::TokenIssuer;
use upgate_core::auth::oauth::{GitHubProvider, GoogleProvider, OAuthProviders};
use upgate_core::store::{
    MemoryRateCounter, MemoryStateStore, MemoryUserStore, PgUserStore, RateCounter,
    RedisRateCounter, RedisStateStore, StateStore, UserStore,
};
use upgate_core::uploads::{FilesService, HttpUploaderClient, UploadsService};

/// CLI arguments for the gateway.
#[derive(Parser, Debug)]
#[command(name = "upgate_server", about = "Upgate API gateway", version)]
struct Args {
    /// Port to listen on. Overrides the port in `BIND_ADDR`.
    #[arg(long, env = "PORT")]
    port: Option<u16>,

    /// PostgreSQL connection URL. Users are kept in memory when unset.
    #[arg(long, env = "DATABASE_URL")]
    database_url: Option<String>,

    /// Redis connection URL for OAuth state and rate counters. In memory when unset.
    #[arg(long, env = "REDIS_URL")]
    redis_url: Option<String>,

    /// Maximum number of database connections in the pool.
    #[arg(long, env = "DATABASE_MAX_CONNECTIONS", default_value_t = 5)]
    max_connections: u32,
}

type Stores = (Arc<dyn UserStore>, Arc<dyn StateStore>, Arc<dyn RateCounter>);

async fn user_store(args: &Args) -> Result<Arc<dyn UserStore>, Box<dyn std::error::Error>> {
    let Some(url) = args.database_url.as_deref() else {
        warn!("DATABASE_URL not set, users are kept in memory");
        return Ok(Arc::new(MemoryUserStore::new()));
    };

    info!(max_connections = args.max_connections, "configuring connection pool");
    let pool = PgPoolOptions::new()
        .max_connections(args.max_connections)
        .acquire_timeout(Duration::from_secs(30))
        .connect(url)
        .await?;

    info!("running database migrations");
    upgate_api::migrate(&pool).await?;
    Ok(Arc::new(PgUserStore::new(pool)))
}

async fn stores(
    args: &Args,
    shutdown: &CancellationToken,
) -> Result<Stores, Box<dyn std::error::Error>> {
    let users = user_store(args).await?;

    if let Some(url) = args.redis_url.as_deref() {
        let redis = RedisStateStore::connect(url).await?;
        let counter: Arc<dyn RateCounter> = Arc::new(RedisRateCounter::new(redis.pool().clone()));
        let states: Arc<dyn StateStore> = Arc::new(redis);
        return Ok((users, states, counter));
    }

    warn!("REDIS_URL not set, OAuth state and rate counters are kept in memory");
    let states = Arc::new(MemoryStateStore::new());
    states.spawn_cleanup_task(shutdown.clone());
    let counter = Arc::new(MemoryRateCounter::new());
    counter.spawn_cleanup_task(shutdown.clone());
    let states: Arc<dyn StateStore> = states;
    let counter: Arc<dyn RateCounter> = counter;
    Ok((users, states, counter))
}

fn providers(config: &ApiConfig) -> Result<OAuthProviders, Box<dyn std::error::Error>> {
    let mut providers = OAuthProviders::new();
    if let Some(OAuthClientConfig {
        client_id,
        client_secret,
        redirect_uri,
    }) = config.github.clone()
    {
        let github = GitHubProvider::new(GitHubProvider::config(
            client_id,
            client_secret,
            redirect_uri,
        ))?;
        providers.register(Arc::new(github));
    }
    if let Some(OAuthClientConfig {
        client_id,
        client_secret,
        redirect_uri,
    }) = config.google.clone()
    {
        let google = GoogleProvider::new(GoogleProvider::config(
            client_id,
            client_secret,
            redirect_uri,
        ))?;
        providers.register(Arc::new(google));
    }
    if providers.is_empty() {
        warn!("no OAuth providers configured");
    } else {
        info!(providers = ?providers.names(), "OAuth providers enabled");
    }
    Ok(providers)
}

fn bind_addr(config: &ApiConfig, port: Option<u16>) -> String {
    match port {
        Some(port) => {
            let host = config
                .bind_addr
                .rsplit_once(':')
                .map(|(host, _)| host)
                .unwrap_or("0.0.0.0");
            format!("{host}:{port}")
        }
        None => config.bind_addr.clone(),
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                tracing_subscriber::EnvFilter::new("info,upgate_api=debug,upgate_core=debug")
            }),
        )
        .init();

    let args = Args::parse();
    let config = ApiConfig::from_env()?;
    info!(
        environment = ?config.environment,
        uploader = %config.uploader_url,
        trusted_proxies = config.trusted_proxies.len(),
        "starting upgate_server v{}",
        upgate_core::version()
    );

    let shutdown = CancellationToken::new();
    let (users, states, counter) = stores(&args, &shutdown).await?;

    let tokens = TokenIssuer::new(
        config.jwt_access_secret.as_bytes(),
        config.jwt_refresh_secret.as_bytes(),
    )?;
    let auth = AuthService::new(users.clone(), states, tokens);

    let uploader = Arc::new(HttpUploaderClient::new(&config.uploader_url)?);
    let state = AppState {
        auth,
        uploads: UploadsService::new(uploader.clone()),
        files: FilesService::new(uploader),
        providers: providers(&config)?,
        users,
        rate_limiter: RateLimiter::per_minute(counter, u64::from(config.rate_limit_per_minute)),
        config: config.clone(),
    };

    let app = upgate_api::router(state);

    let listener = tokio::net::TcpListener::bind(bind_addr(&config, args.port)).await?;
    info!(addr = %listener.local_addr()?, "REST API listening");

    tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!(error = %e, "could not listen for ctrl-c");
                return;
            }
            info!("shutdown requested");
            shutdown.cancel();
        }
    });

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown({
        let shutdown = shutdown.clone();
        async move { shutdown.cancelled().await }
    })
    .await?;

    shutdown.cancel();
    info!("server stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn port_overrides_bind_addr() {
        let config = ApiConfig::from_lookup(|var| match var {
            "JWT_ACCESS_SECRET" => Some("a".into()),
            "JWT_REFRESH_SECRET" => Some("b".into()),
            "BIND_ADDR" => Some("127.0.0.1:8080".into()),
            _ => None,
        })
        .unwrap();
        assert_eq!(bind_addr(&config, None), "127.0.0.1:8080");
        assert_eq!(bind_addr(&config, Some(9000)), "127.0.0.1:9000");
    }

    #[test]
    fn args_parse() {
        let args = Args::try_parse_from([
            "upgate_server",
            "--port",
            "8081",
            "--redis-url",
            "redis://localhost:6379",
        ])
        .unwrap();
        assert_eq!(args.port, Some(8081));
        assert_eq!(args.redis_url.as_deref(), Some("redis://localhost:6379"));
        assert_eq!(args.max_connections, 5);
    }
}
