use axum::{
    Json,
    extract::{Multipart, State},
    http::StatusCode,
    response::IntoResponse,
};

use crate::{
    error::AppError,
    state::AppState,
    utils::{
        jwt::AuthUser,
        upload::{Accept, read_single, store},
    },
};

/// Generic upload for message attachments and inline images.
/// Returns `{url, key, content_type, size}`.
pub async fn upload_file(
    State(state): State<AppState>,
    user: AuthUser,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, AppError> {
    let file = read_single(&mut multipart, "file", Accept::ImagesAndPdf, state.config.max_upload_bytes).await?;
    let stored = store(state.storage.as_ref(), &format!("files/{}", user.id), file).await?;

    tracing::info!(user_id = user.id, key = %stored.key, size = stored.size, "file uploaded");
    Ok((StatusCode::CREATED, Json(stored)))
}
