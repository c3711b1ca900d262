use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::repo::User;

/// Public part of the user returned to clients; never carries the hash.
#[derive(Debug, Serialize)]
pub struct PublicUser {
    pub id: Uuid,
    pub email: String,
    pub nickname: String,
    pub image: Option<String>,
}

impl From<User> for PublicUser {
    fn from(u: User) -> Self {
        Self {
            id: u.id,
            email: u.email,
            nickname: u.nickname,
            image: u.image,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct UpdateNicknameRequest {
    pub nickname: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdateProfileRequest {
    pub image: String,
}

/// Response for profile mutations.
#[derive(Debug, Serialize)]
pub struct UserUpdateResponse {
    pub success: bool,
    pub message: String,
    pub user: PublicUser,
}

#[derive(Debug, Serialize)]
pub struct ProfileResponse {
    pub user: PublicUser,
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::OffsetDateTime;

    #[test]
    fn public_user_never_leaks_password_hash() {
        let user = User {
            id: Uuid::new_v4(),
            email: "test@example.com".into(),
            password_hash: "$argon2id$v=19$secret".into(),
            nickname: "tester".into(),
            image: None,
            status: "Y".into(),
            created_at: OffsetDateTime::now_utc(),
        };
        let json = serde_json::to_string(&PublicUser::from(user)).unwrap();
        assert!(json.contains("test@example.com"));
        assert!(!json.contains("argon2"));
        assert!(!json.contains("password"));
    }

    #[test]
    fn user_row_serialization_skips_hash() {
        let user = User {
            id: Uuid::new_v4(),
            email: "test@example.com".into(),
            password_hash: "$argon2id$v=19$secret".into(),
            nickname: "tester".into(),
            image: Some("uploads/profile/abc.png".into()),
            status: "Y".into(),
            created_at: OffsetDateTime::now_utc(),
        };
        let json = serde_json::to_string(&user).unwrap();
        assert!(!json.contains("argon2"));
    }
}
