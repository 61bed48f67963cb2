//! Upload session handlers.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::{Extension, Json};
use upgate_core::models::uploads::{UploadSession, UploadStatus};

use super::json_body;
use crate::AppState;
use crate::error::AppResult;
use crate::middleware::auth::AuthenticatedUser;
use crate::models::StartUploadRequest;

/// `POST /uploads/start`: open a chunked-upload session for the caller.
pub async fn start_upload_handler(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    payload: Result<Json<StartUploadRequest>, JsonRejection>,
) -> AppResult<Json<UploadSession>> {
    let file_size = json_body(payload)?.file_size.parse()?;
    let session = state.uploads.start_upload(user.email(), file_size).await?;
    Ok(Json(session))
}

/// `GET /uploads/{upload_id}/status`
pub async fn upload_status_handler(
    State(state): State<AppState>,
    Path(upload_id): Path<String>,
) -> AppResult<Json<UploadStatus>> {
    Ok(Json(state.uploads.upload_status(&upload_id).await?))
}
