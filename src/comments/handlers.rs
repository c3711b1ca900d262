use axum::{extract::State, routing::post, Json, Router};
use tracing::{info, instrument};

use super::dto::{CreateCommentRequest, StatusResponse};
use super::repo::Comment;
use crate::{auth::jwt::AuthUser, error::ApiError, state::AppState};

const VALID_STATUSES: [&str; 4] = ["Y", "N", "T", "H"];

pub fn comment_routes() -> Router<AppState> {
    Router::new().route("/comments", post(create_comment))
}

#[instrument(skip(state, payload))]
pub async fn create_comment(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Json(payload): Json<CreateCommentRequest>,
) -> Result<Json<StatusResponse>, ApiError> {
    if payload.content.trim().is_empty() {
        return Err(ApiError::bad_request("댓글 내용을 입력해주세요."));
    }
    let status = payload.status.as_deref().unwrap_or("Y");
    if !VALID_STATUSES.contains(&status) {
        return Err(ApiError::bad_request("올바르지 않은 댓글 상태입니다."));
    }

    let comment = Comment::create(
        &state.db,
        payload.post_id,
        user_id,
        &payload.content,
        status,
    )
    .await?;

    info!(comment_id = %comment.id, post_id = %payload.post_id, "comment created");
    Ok(Json(StatusResponse {
        success: true,
        message: "댓글 생성 완료".into(),
    }))
}
