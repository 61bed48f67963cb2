//! Authentication middleware: session cookie or Bearer token, then JWT
//! verification.

use axum::extract::{Request, State};
use axum::http::HeaderMap;
use axum::http::header::AUTHORIZATION;
use axum::middleware::Next;
use axum::response::Response;
use axum_extra::extract::cookie::CookieJar;
use tracing::debug;
use upgate_core::models::auth::TokenClaims;

use crate::AppState;
use crate::error::AppError;
use crate::services::cookies::{self, ACCESS_COOKIE, REFRESH_COOKIE};

/// Verified access-token claims, stored in request extensions.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser(pub TokenClaims);

impl AuthenticatedUser {
    pub fn email(&self) -> &str {
        &self.0.sub
    }
}

/// Access token from the `jwt` cookie, else from `Authorization: Bearer`.
pub fn access_token(headers: &HeaderMap) -> Option<String> {
    let jar = CookieJar::from_headers(headers);
    cookies::read(&jar, ACCESS_COOKIE).or_else(|| {
        headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string)
    })
}

/// Axum middleware: verifies the access token and injects
/// [`AuthenticatedUser`] into request extensions.
///
/// A missing or invalid token with a refresh cookie present tells the client
/// to refresh instead of logging in again.
pub async fn require_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let jar = CookieJar::from_headers(request.headers());
    let can_refresh = cookies::read(&jar, REFRESH_COOKIE).is_some();
    let rejected = || {
        if can_refresh {
            AppError::Unauthorized("access token expired, refresh required".into())
        } else {
            AppError::Unauthorized("invalid token".into())
        }
    };

    let token = access_token(request.headers()).ok_or_else(rejected)?;
    let claims = state.auth.validate_access(&token).map_err(|e| {
        debug!(error = %e, path = %request.uri().path(), "access token rejected");
        rejected()
    })?;

    request.extensions_mut().insert(AuthenticatedUser(claims));
    Ok(next.run(request).await)
}
