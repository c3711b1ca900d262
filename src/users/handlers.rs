use axum::{
    extract::State,
    routing::{delete, post},
    Json, Router,
};
use tracing::{info, instrument, warn};

use super::dto::{
    ProfileResponse, PublicUser, UpdateNicknameRequest, UpdateProfileRequest, UserUpdateResponse,
};
use super::repo::User;
use crate::{auth::jwt::AuthUser, error::ApiError, state::AppState, uploads};

pub fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/users/nickname", post(update_nickname))
        .route("/users/profile", post(update_profile))
        .route("/users/profile-image", delete(delete_profile_image))
}

#[instrument(skip(state, payload))]
pub async fn update_nickname(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Json(payload): Json<UpdateNicknameRequest>,
) -> Result<Json<UserUpdateResponse>, ApiError> {
    let len = payload.nickname.chars().count();
    if !(2..=50).contains(&len) {
        return Err(ApiError::bad_request(
            "닉네임은 2자 이상 50자 이하여야 합니다.",
        ));
    }

    let user = User::update_nickname(&state.db, user_id, &payload.nickname)
        .await?
        .ok_or_else(|| ApiError::not_found("사용자를 찾을 수 없습니다."))?;

    info!(user_id = %user.id, "nickname updated");
    Ok(Json(UserUpdateResponse {
        success: true,
        message: "닉네임이 변경되었습니다.".into(),
        user: PublicUser::from(user),
    }))
}

#[instrument(skip(state, payload))]
pub async fn update_profile(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Json(payload): Json<UpdateProfileRequest>,
) -> Result<Json<ProfileResponse>, ApiError> {
    let user = User::find_by_id(&state.db, user_id)
        .await?
        .ok_or_else(|| ApiError::not_found("사용자를 찾을 수 없습니다."))?;

    // Replacing an image orphans the old attachment; clean it up first.
    if let Some(old) = &user.image {
        if let Err(e) = uploads::service::remove_attachment_by_filepath(&state, old).await {
            warn!(error = %e, user_id = %user_id, "failed to remove previous profile image");
        }
    }

    let user = User::update_image(&state.db, user_id, Some(&payload.image))
        .await?
        .ok_or_else(|| ApiError::not_found("사용자를 찾을 수 없습니다."))?;

    info!(user_id = %user.id, "profile image updated");
    Ok(Json(ProfileResponse {
        user: PublicUser::from(user),
    }))
}

#[instrument(skip(state))]
pub async fn delete_profile_image(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<UserUpdateResponse>, ApiError> {
    let user = User::find_by_id(&state.db, user_id)
        .await?
        .ok_or_else(|| ApiError::not_found("사용자를 찾을 수 없습니다."))?;

    let Some(image) = user.image else {
        return Err(ApiError::bad_request("프로필 이미지가 없습니다."));
    };

    if let Err(e) = uploads::service::remove_attachment_by_filepath(&state, &image).await {
        warn!(error = %e, user_id = %user_id, "failed to remove profile image attachment");
    }

    let user = User::update_image(&state.db, user_id, None)
        .await?
        .ok_or_else(|| ApiError::not_found("사용자를 찾을 수 없습니다."))?;

    info!(user_id = %user.id, "profile image deleted");
    Ok(Json(UserUpdateResponse {
        success: true,
        message: "프로필 이미지가 삭제되었습니다.".into(),
        user: PublicUser::from(user),
    }))
}
