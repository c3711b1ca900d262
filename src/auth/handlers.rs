use axum::{
    extract::{FromRef, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use lazy_static::lazy_static;
use regex::Regex;
use tracing::{info, instrument, warn};

use super::dto::{
    LoginRequest, LoginResponse, LogoutResponse, RefreshRequest, RefreshResponse, RegisterRequest,
    RegisterResponse,
};
use super::jwt::{AuthUser, JwtKeys};
use super::{password, service};
use crate::{
    error::ApiError,
    state::AppState,
    users::{dto::PublicUser, repo::User},
};

const LOGIN_FAILED_MSG: &str = "이메일 또는 비밀번호가 틀렸습니다.";
const REFRESH_FAILED_MSG: &str = "리프레시 토큰이 만료되었거나 유효하지 않습니다.";

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/auth/refresh", post(refresh))
        .route("/auth/logout", post(logout))
        .route("/auth/me", get(me))
}

#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    Json(mut payload): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<RegisterResponse>), ApiError> {
    payload.email = payload.email.trim().to_lowercase();

    if !is_valid_email(&payload.email) {
        return Err(ApiError::bad_request("올바른 이메일 형식이 아닙니다."));
    }
    if payload.password.len() < 6 {
        return Err(ApiError::bad_request("비밀번호는 6자 이상이어야 합니다."));
    }
    let nickname_len = payload.nickname.chars().count();
    if !(2..=50).contains(&nickname_len) {
        return Err(ApiError::bad_request(
            "닉네임은 2자 이상 50자 이하여야 합니다.",
        ));
    }

    if User::find_by_email(&state.db, &payload.email).await?.is_some() {
        warn!(email = %payload.email, "email already registered");
        return Err(ApiError::conflict("이미 존재하는 이메일입니다."));
    }

    let hash = password::hash_password(&payload.password)?;
    let user = User::create(&state.db, &payload.email, &hash, &payload.nickname).await?;

    info!(user_id = %user.id, email = %user.email, "user registered");
    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            message: "회원가입이 완료되었습니다.".into(),
            user: PublicUser::from(user),
        }),
    ))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    Json(mut payload): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, ApiError> {
    payload.email = payload.email.trim().to_lowercase();

    // Same message for unknown email and bad password: no user enumeration.
    let user = User::find_by_email(&state.db, &payload.email)
        .await?
        .ok_or_else(|| {
            warn!(email = %payload.email, "login with unknown email");
            ApiError::unauthorized(LOGIN_FAILED_MSG)
        })?;

    let ok = password::verify_password(&payload.password, &user.password_hash)?;
    if !ok {
        warn!(user_id = %user.id, "login with invalid password");
        return Err(ApiError::unauthorized(LOGIN_FAILED_MSG));
    }

    let keys = JwtKeys::from_ref(&state);
    let pair =
        service::establish_session(state.sessions.as_ref(), &keys, user.id, &user.email).await?;

    info!(user_id = %user.id, "user logged in");
    Ok(Json(LoginResponse {
        access_token: pair.access_token,
        refresh_token: pair.refresh_token,
        user: PublicUser::from(user),
    }))
}

#[instrument(skip(state, payload))]
pub async fn refresh(
    State(state): State<AppState>,
    Json(payload): Json<RefreshRequest>,
) -> Result<Json<RefreshResponse>, ApiError> {
    let keys = JwtKeys::from_ref(&state);
    let access_token =
        service::refresh_access_token(state.sessions.as_ref(), &keys, &payload.refresh_token)
            .await
            .map_err(|e| {
                // One external message for every variant; the variant goes to the log.
                warn!(reason = %e, "refresh rejected");
                ApiError::unauthorized(REFRESH_FAILED_MSG)
            })?;

    Ok(Json(RefreshResponse { access_token }))
}

#[instrument(skip(state))]
pub async fn logout(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<LogoutResponse>, ApiError> {
    service::clear_session(state.sessions.as_ref(), user_id).await?;

    info!(user_id = %user_id, "user logged out");
    Ok(Json(LogoutResponse {
        message: "로그아웃이 완료되었습니다.".into(),
    }))
}

#[instrument(skip(state))]
pub async fn me(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<PublicUser>, ApiError> {
    let user = User::find_by_id(&state.db, user_id)
        .await?
        .ok_or_else(|| ApiError::not_found("사용자를 찾을 수 없습니다."))?;

    Ok(Json(PublicUser::from(user)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_validation_accepts_plain_addresses() {
        assert!(is_valid_email("a@x.com"));
        assert!(is_valid_email("first.last@sub.domain.co.kr"));
    }

    #[test]
    fn email_validation_rejects_garbage() {
        assert!(!is_valid_email("not-an-email"));
        assert!(!is_valid_email("a b@x.com"));
        assert!(!is_valid_email("a@x"));
        assert!(!is_valid_email("@x.com"));
    }
}
