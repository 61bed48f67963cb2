//! Local authentication handlers: register, login, refresh, logout, me, state.

use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::http::{HeaderMap, StatusCode};
use axum_extra::extract::cookie::CookieJar;
use tracing::debug;

use super::json_body;
use crate::AppState;
use crate::error::{AppError, AppResult};
use crate::middleware::auth::access_token;
use crate::models::{LoginRequest, MeResponse, MessageResponse, RegisterRequest, StateResponse};
use crate::services::cookies::{self, REFRESH_COOKIE};

/// `POST /auth/register`: create a local account.
pub async fn register_handler(
    State(state): State<AppState>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> AppResult<(StatusCode, Json<MessageResponse>)> {
    let registration = json_body(payload)?.into_registration()?;
    state.auth.register(registration).await?;
    Ok((StatusCode::CREATED, Json(MessageResponse::new("created"))))
}

/// `POST /auth/login`: authenticate with email + password and set session cookies.
pub async fn login_handler(
    State(state): State<AppState>,
    jar: CookieJar,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> AppResult<(CookieJar, Json<MessageResponse>)> {
    let body = json_body(payload)?;
    body.validate()?;
    let login = state.auth.login(body.email.trim(), &body.password).await?;
    let jar = cookies::with_session(jar, &login.tokens, state.config.secure_cookies());
    Ok((jar, Json(MessageResponse::new("login successful"))))
}

/// `POST /auth/refresh`: rotate both session cookies using the refresh cookie.
pub async fn refresh_handler(
    State(state): State<AppState>,
    jar: CookieJar,
) -> AppResult<(CookieJar, Json<MessageResponse>)> {
    let refresh_token = cookies::read(&jar, REFRESH_COOKIE)
        .ok_or_else(|| AppError::Unauthorized("no refresh token".into()))?;
    let tokens = state.auth.refresh(&refresh_token).await?;
    let jar = cookies::with_session(jar, &tokens, state.config.secure_cookies());
    Ok((jar, Json(MessageResponse::new("tokens refreshed"))))
}

/// `POST /auth/logout`: clear both session cookies.
pub async fn logout_handler(
    State(state): State<AppState>,
    jar: CookieJar,
) -> (CookieJar, Json<MessageResponse>) {
    let jar = cookies::clear_session(jar, state.config.secure_cookies());
    (jar, Json(MessageResponse::new("logged out")))
}

/// `GET /auth/me`: the user behind the current access token.
pub async fn me_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> AppResult<Json<MeResponse>> {
    let token =
        access_token(&headers).ok_or_else(|| AppError::Unauthorized("invalid token".into()))?;
    let user = state.auth.current_user(&token).await?;
    Ok(Json(MeResponse {
        email: user.email,
        name: user.name,
        authenticated: true,
    }))
}

/// `POST /auth/state`: issue a single-use OAuth state nonce.
pub async fn state_handler(State(state): State<AppState>) -> AppResult<Json<StateResponse>> {
    let nonce = state.auth.save_state().await?;
    debug!("oauth state issued");
    Ok(Json(StateResponse { state: nonce }))
}
