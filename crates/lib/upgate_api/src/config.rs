//! API server configuration.

use std::net::IpAddr;

use thiserror::Error;
use url::Url;
use upgate_core::auth::jwt::persisted_secret;

/// Deployment environment. Cookies are only sent without `Secure` in `Dev`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Environment {
    Dev,
    Test,
    Prod,
}

impl Environment {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "dev" | "development" => Some(Environment::Dev),
            "test" => Some(Environment::Test),
            "prod" | "production" => Some(Environment::Prod),
            _ => None,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {var}: {reason}")]
    Invalid { var: &'static str, reason: String },

    #[error("JWT_ACCESS_SECRET and JWT_REFRESH_SECRET must be set to different values")]
    SharedSecret,
}

/// Client credentials for one OAuth provider.
#[derive(Clone, Debug)]
pub struct OAuthClientConfig {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
}

/// Configuration for the API server.
#[derive(Clone, Debug)]
pub struct ApiConfig {
    /// Address to bind the HTTP listener (e.g. "0.0.0.0:8080").
    pub bind_addr: String,
    pub environment: Environment,
    /// Where OAuth callbacks redirect after a successful login.
    pub frontend_url: String,
    pub jwt_access_secret: String,
    pub jwt_refresh_secret: String,
    /// Allowed CORS origins. Empty means same-origin only.
    pub cors_origins: Vec<String>,
    pub github: Option<OAuthClientConfig>,
    pub google: Option<OAuthClientConfig>,
    /// Base URL of the downstream upload service.
    pub uploader_url: String,
    pub rate_limit_per_minute: u32,
    /// Peers whose `X-Forwarded-For` / `X-Real-IP` headers are believed.
    pub trusted_proxies: Vec<IpAddr>,
}

impl ApiConfig {
    /// Reads configuration from environment variables with sensible defaults.
    ///
    /// | Variable                 | Default                                  |
    /// |--------------------------|------------------------------------------|
    /// | `BIND_ADDR`              | `0.0.0.0:8080`                           |
    /// | `APP_ENV`                | `prod`                                   |
    /// | `FRONTEND_URL`           | `http://localhost:3000`                  |
    /// | `JWT_ACCESS_SECRET`      | generated & persisted to file            |
    /// | `JWT_REFRESH_SECRET`     | generated & persisted to file            |
    /// | `CORS_ORIGINS`           | value of `FRONTEND_URL`                  |
    /// | `GITHUB_CLIENT_ID` etc.  | provider disabled                        |
    /// | `GOOGLE_CLIENT_ID` etc.  | provider disabled                        |
    /// | `UPLOADER_URL`           | `http://127.0.0.1:8081`                  |
    /// | `RATE_LIMIT_PER_MINUTE`  | `100`                                    |
    /// | `TRUSTED_PROXIES`        | none (client IP is the socket peer)      |
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Build from an arbitrary variable source. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |var: &str| lookup(var).filter(|v| !v.trim().is_empty());

        let environment = match get("APP_ENV") {
            Some(v) => Environment::parse(&v).ok_or_else(|| ConfigError::Invalid {
                var: "APP_ENV",
                reason: format!("expected dev, test or prod, got {v}"),
            })?,
            None => Environment::Prod,
        };

        let frontend_url = get("FRONTEND_URL").unwrap_or_else(|| "http://localhost:3000".into());
        check_url("FRONTEND_URL", &frontend_url)?;

        let uploader_url = get("UPLOADER_URL").unwrap_or_else(|| "http://127.0.0.1:8081".into());
        check_url("UPLOADER_URL", &uploader_url)?;

        let cors_origins = get("CORS_ORIGINS")
            .map(|v| {
                v.split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect()
            })
            .unwrap_or_else(|| vec![frontend_url.clone()]);

        let rate_limit_per_minute = match get("RATE_LIMIT_PER_MINUTE") {
            Some(v) => v.trim().parse::<u32>().map_err(|e| ConfigError::Invalid {
                var: "RATE_LIMIT_PER_MINUTE",
                reason: e.to_string(),
            })?,
            None => 100,
        };

        let trusted_proxies = match get("TRUSTED_PROXIES") {
            Some(v) => v
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(|s| {
                    s.parse::<IpAddr>().map_err(|e| ConfigError::Invalid {
                        var: "TRUSTED_PROXIES",
                        reason: format!("{s}: {e}"),
                    })
                })
                .collect::<Result<Vec<_>, _>>()?,
            None => Vec::new(),
        };

        let oauth_client = |prefix: &str, provider: &str| -> Option<OAuthClientConfig> {
            let client_id = get(&format!("{prefix}_CLIENT_ID"))?;
            let client_secret = get(&format!("{prefix}_CLIENT_SECRET"))?;
            let redirect_uri = get(&format!("{prefix}_REDIRECT_URI"))
                .unwrap_or_else(|| format!("http://localhost:8080/auth/{provider}/callback"));
            Some(OAuthClientConfig {
                client_id,
                client_secret,
                redirect_uri,
            })
        };

        let config = Self {
            bind_addr: get("BIND_ADDR").unwrap_or_else(|| "0.0.0.0:8080".into()),
            environment,
            frontend_url,
            jwt_access_secret: get("JWT_ACCESS_SECRET")
                .unwrap_or_else(|| persisted_secret("jwt-access-secret")),
            jwt_refresh_secret: get("JWT_REFRESH_SECRET")
                .unwrap_or_else(|| persisted_secret("jwt-refresh-secret")),
            cors_origins,
            github: oauth_client("GITHUB", "github"),
            google: oauth_client("GOOGLE", "google"),
            uploader_url,
            rate_limit_per_minute,
            trusted_proxies,
        };
        config.validate()?;
        Ok(config)
    }

    /// Reject configurations that would weaken token separation.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.jwt_access_secret == self.jwt_refresh_secret {
            return Err(ConfigError::SharedSecret);
        }
        Ok(())
    }

    /// Whether auth cookies carry the `Secure` attribute.
    pub fn secure_cookies(&self) -> bool {
        self.environment != Environment::Dev
    }
}

fn check_url(var: &'static str, value: &str) -> Result<(), ConfigError> {
    Url::parse(value).map(|_| ()).map_err(|e| ConfigError::Invalid {
        var,
        reason: e.to_string(),
    })
}
