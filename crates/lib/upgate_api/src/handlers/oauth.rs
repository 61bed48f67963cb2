//! OAuth authorization-code callback.

use axum::extract::{Path, Query, State};
use axum::response::Redirect;
use axum_extra::extract::cookie::CookieJar;
use tracing::warn;

use crate::AppState;
use crate::error::{AppError, AppResult};
use crate::models::CallbackQuery;
use crate::services::cookies;

/// `GET /auth/{provider}/callback`: finish the provider login, set session
/// cookies and send the browser back to the frontend with a 303.
pub async fn callback_handler(
    State(state): State<AppState>,
    Path(provider): Path<String>,
    Query(query): Query<CallbackQuery>,
    jar: CookieJar,
) -> AppResult<(CookieJar, Redirect)> {
    let adapter = state.providers.get(&provider).ok_or_else(|| {
        warn!(%provider, "callback for unconfigured provider");
        AppError::NotFound(format!("unknown provider: {provider}"))
    })?;

    let login = state
        .auth
        .oauth_login(
            adapter.as_ref(),
            query.code.as_deref(),
            query.state.as_deref(),
        )
        .await?;

    let jar = cookies::with_session(jar, &login.tokens, state.config.secure_cookies());
    Ok((jar, Redirect::to(&state.config.frontend_url)))
}
