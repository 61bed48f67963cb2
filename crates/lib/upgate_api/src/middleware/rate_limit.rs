//! Per-IP rate limiting middleware.

use std::net::{IpAddr, SocketAddr};

use axum::extract::{ConnectInfo, Request, State};
use axum::http::{HeaderMap, HeaderValue};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use tracing::{debug, warn};

use crate::AppState;
use crate::error::AppError;
use crate::services::rate_limit::RateLimitResult;

/// Client IP for rate limiting.
///
/// The socket peer is the client unless it is one of `trusted` proxies. Behind
/// a trusted proxy the `X-Forwarded-For` chain is walked right to left and the
/// first hop that is not itself a trusted proxy wins; `X-Real-IP` is the
/// fallback. Without a peer address forwarding headers are ignored.
pub fn client_ip(
    headers: &HeaderMap,
    peer: Option<SocketAddr>,
    trusted: &[IpAddr],
) -> Option<IpAddr> {
    let peer = peer?.ip();
    if !trusted.contains(&peer) {
        return Some(peer);
    }

    let forwarded: Vec<IpAddr> = headers
        .get_all("x-forwarded-for")
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .filter_map(|hop| hop.trim().parse().ok())
        .collect();
    if let Some(ip) = forwarded.iter().rev().find(|ip| !trusted.contains(ip)) {
        return Some(*ip);
    }

    let real_ip = headers
        .get("x-real-ip")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse().ok());
    Some(real_ip.or(forwarded.first().copied()).unwrap_or(peer))
}

/// Reject clients over the per-minute limit with 429. Counter failures let the
/// request through.
pub async fn rate_limit(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    let ip = client_ip(request.headers(), peer, &state.config.trusted_proxies)
        .map(|ip| ip.to_string())
        .unwrap_or_else(|| "unknown".to_string());

    match state.rate_limiter.check_ip(&ip).await {
        Ok(RateLimitResult::Allowed { .. }) => next.run(request).await,
        Ok(RateLimitResult::Limited { retry_after }) => {
            debug!(%ip, path = %request.uri().path(), "request rate limited");
            let mut response = AppError::TooManyRequests.into_response();
            if let Ok(value) = HeaderValue::from_str(&retry_after.to_string()) {
                response.headers_mut().insert("retry-after", value);
            }
            response
        }
        Err(e) => {
            warn!(error = %e, %ip, "rate limit check failed, allowing request");
            next.run(request).await
        }
    }
}
