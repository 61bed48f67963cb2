//! File listing handler.

use axum::extract::State;
use axum::{Extension, Json};

use crate::AppState;
use crate::error::AppResult;
use crate::middleware::auth::AuthenticatedUser;
use crate::models::FilesResponse;

/// `GET /files`: the caller's completed files.
pub async fn list_files_handler(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
) -> AppResult<Json<FilesResponse>> {
    let files = state.files.list_files(user.email()).await?;
    Ok(Json(FilesResponse { files }))
}
