use axum::{
    extract::{Query, State},
    routing::post,
    Json, Router,
};
use tracing::{info, instrument};

use super::dto::{
    CreatePostRequest, PageQuery, Pagination, PostListItem, PostsPage, StatusResponse,
    TempSavePostRequest, TempSaveResponse, POST_PAGE_SIZE, VALID_STATUSES,
};
use super::repo::Post;
use crate::{auth::jwt::AuthUser, error::ApiError, state::AppState};

pub fn post_routes() -> Router<AppState> {
    Router::new()
        .route("/posts", post(create_post).get(list_posts))
        .route("/posts/temp", post(temp_save_post))
}

#[instrument(skip(state, payload))]
pub async fn create_post(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Json(payload): Json<CreatePostRequest>,
) -> Result<Json<StatusResponse>, ApiError> {
    if payload.title.trim().is_empty() || payload.content.trim().is_empty() {
        return Err(ApiError::bad_request("제목과 내용을 입력해주세요."));
    }
    let status = payload.status.as_deref().unwrap_or("Y");
    if !VALID_STATUSES.contains(&status) {
        return Err(ApiError::bad_request("올바르지 않은 게시글 상태입니다."));
    }

    let post = Post::create(
        &state.db,
        user_id,
        &payload.title,
        &payload.content,
        &payload.thumbnail,
        status,
    )
    .await?;

    info!(post_id = %post.id, author_id = %user_id, "post created");
    Ok(Json(StatusResponse {
        success: true,
        message: "게시글 생성 완료".into(),
    }))
}

/// Drafts are stored with status `T` and never show up in the public list.
#[instrument(skip(state, payload))]
pub async fn temp_save_post(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Json(payload): Json<TempSavePostRequest>,
) -> Result<Json<TempSaveResponse>, ApiError> {
    if payload.title.trim().is_empty() {
        return Err(ApiError::bad_request("제목을 입력해주세요."));
    }

    let post = Post::create(
        &state.db,
        user_id,
        &payload.title,
        payload.content.as_deref().unwrap_or(""),
        payload.thumbnail.as_deref().unwrap_or(""),
        "T",
    )
    .await?;

    info!(post_id = %post.id, author_id = %user_id, "post temp-saved");
    Ok(Json(TempSaveResponse {
        success: true,
        message: "임시저장 완료".into(),
        data: post,
    }))
}

#[instrument(skip(state))]
pub async fn list_posts(
    State(state): State<AppState>,
    Query(query): Query<PageQuery>,
) -> Result<Json<PostsPage>, ApiError> {
    let page = query.page.unwrap_or(1).max(1);
    let offset = (page - 1) * POST_PAGE_SIZE;

    let (rows, total_count) = tokio::try_join!(
        Post::list_active(&state.db, POST_PAGE_SIZE, offset),
        Post::count_active(&state.db),
    )?;

    Ok(Json(PostsPage {
        posts: rows.into_iter().map(PostListItem::from).collect(),
        pagination: Pagination::build(page, POST_PAGE_SIZE, total_count),
    }))
}
