use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, State},
    response::Redirect,
    routing::post,
    Json, Router,
};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use super::dto::{DeleteFileResponse, UploadedFile};
use super::repo::Attachment;
use super::service::{store_files, UploadItem};
use crate::{auth::jwt::AuthUser, error::ApiError, state::AppState};

const MAX_FILES: usize = 10;

pub fn upload_routes() -> Router<AppState> {
    // One path pattern, three methods: POST takes a directory name, GET and
    // DELETE an attachment id.
    Router::new()
        .route(
            "/uploads/:directory",
            post(upload_files).get(get_file).delete(delete_file),
        )
        .layer(DefaultBodyLimit::max(20 * 1024 * 1024)) // 20MB
}

fn is_valid_directory(directory: &str) -> bool {
    !directory.is_empty()
        && directory
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

#[instrument(skip(state, multipart))]
pub async fn upload_files(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(directory): Path<String>,
    mut multipart: Multipart,
) -> Result<Json<Vec<UploadedFile>>, ApiError> {
    if !is_valid_directory(&directory) {
        return Err(ApiError::bad_request("올바르지 않은 디렉토리 이름입니다."));
    }

    let mut files: Vec<UploadItem> = Vec::new();
    let mut target_type = "ETC".to_string();
    let mut target = "0".to_string();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::bad_request(e.to_string()))?
    {
        match field.name() {
            Some("files") | Some("files[]") => {
                if files.len() >= MAX_FILES {
                    return Err(ApiError::bad_request(
                        "파일은 최대 10개까지 업로드할 수 있습니다.",
                    ));
                }
                let origin_name = field
                    .file_name()
                    .map(|s| s.to_string())
                    .unwrap_or_else(|| "file".into());
                let content_type = field
                    .content_type()
                    .map(|s| s.to_string())
                    .unwrap_or_else(|| "application/octet-stream".into());
                let body = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::bad_request(e.to_string()))?;
                files.push(UploadItem {
                    origin_name,
                    content_type,
                    body,
                });
            }
            Some("target_type") => {
                target_type = field
                    .text()
                    .await
                    .map_err(|e| ApiError::bad_request(e.to_string()))?;
            }
            Some("target") => {
                target = field
                    .text()
                    .await
                    .map_err(|e| ApiError::bad_request(e.to_string()))?;
            }
            _ => {}
        }
    }

    if files.is_empty() {
        return Err(ApiError::bad_request("파일이 없습니다."));
    }

    let stored = store_files(&state, &directory, &target_type, &target, files).await?;

    info!(user_id = %user_id, directory = %directory, count = stored.len(), "files uploaded");
    Ok(Json(
        stored
            .into_iter()
            .map(|f| UploadedFile {
                id: f.id,
                filepath: f.filepath,
            })
            .collect(),
    ))
}

/// 302 to a short-lived presigned URL for the stored object.
#[instrument(skip(state))]
pub async fn get_file(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Redirect, ApiError> {
    let attachment = Attachment::find_by_id(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::not_found("파일 정보를 찾을 수 없습니다."))?;

    let url = state.storage.presign_get(&attachment.filepath, 600).await?;
    Ok(Redirect::temporary(&url))
}

#[instrument(skip(state))]
pub async fn delete_file(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<DeleteFileResponse>, ApiError> {
    let attachment = Attachment::find_by_id(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::bad_request("파일 정보를 찾을 수 없습니다."))?;

    // A missing object is fine; the metadata row is what must go.
    if let Err(e) = state.storage.delete_object(&attachment.filepath).await {
        warn!(error = %e, filepath = %attachment.filepath, "failed to delete stored object");
    }
    Attachment::delete(&state.db, attachment.id).await?;

    info!(user_id = %user_id, attachment_id = %id, "file deleted");
    Ok(Json(DeleteFileResponse {
        success: true,
        message: "파일이 삭제되었습니다.".into(),
    }))
}
