//! Readiness endpoint.

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use tracing::warn;

use crate::AppState;
use crate::models::{BreakerHealth, HealthResponse};

/// `GET /health`: user store reachability plus breaker states.
///
/// Returns 503 when the user store does not answer.
pub async fn health_handler(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let user_store = match state.users.ping().await {
        Ok(()) => true,
        Err(e) => {
            warn!(error = %e, "user store health check failed");
            false
        }
    };

    let breakers = state
        .uploads
        .breaker_states()
        .into_iter()
        .chain(std::iter::once(state.files.breaker_state()))
        .map(|(name, s)| BreakerHealth {
            name,
            state: s.as_str().to_string(),
        })
        .collect();

    let (status, label) = if user_store {
        (StatusCode::OK, "ok")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "degraded")
    };
    (
        status,
        Json(HealthResponse {
            status: label.to_string(),
            user_store,
            breakers,
        }),
    )
}
