use std::sync::Arc;

use axum::Json;
use axum::extract::{Multipart, State};
use be_authz::AuthUser;
use chrono::Utc;

use crate::{AppState, ImageUpload, StorageError, UploadedImage};

/// `POST /upload-image`: multipart with a `file` part and an optional
/// `folder` text part. Unknown parts are ignored.
pub async fn upload_image(
    State(state): State<Arc<AppState>>,
    AuthUser(principal): AuthUser,
    mut multipart: Multipart,
) -> Result<Json<UploadedImage>, StorageError> {
    let mut upload = ImageUpload::default();
    let mut has_file = false;

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("file") => {
                upload.file_name = field.file_name().map(str::to_string);
                upload.content_type = field.content_type().map(str::to_string);
                upload.bytes = field.bytes().await?;
                has_file = true;
            }
            Some("folder") => upload.folder = Some(field.text().await?),
            _ => {}
        }
    }
    if !has_file {
        return Err(StorageError::MissingFile);
    }

    let uploaded = state
        .storage
        .upload(principal.user_id, upload, Utc::now())
        .await?;
    Ok(Json(uploaded))
}
