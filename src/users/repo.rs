use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use time::OffsetDateTime;
use uuid::Uuid;

/// User record in the database.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String, // Argon2 hash, not exposed in JSON
    pub nickname: String,
    pub image: Option<String>,
    pub status: String, // Y/N/T/H
    pub created_at: OffsetDateTime,
}

impl User {
    pub async fn find_by_email(db: &PgPool, email: &str) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, email, password_hash, nickname, image, status, created_at
            FROM users
            WHERE email = $1
            "#,
        )
        .bind(email)
        .fetch_optional(db)
        .await?;
        Ok(user)
    }

    pub async fn find_by_id(db: &PgPool, id: Uuid) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, email, password_hash, nickname, image, status, created_at
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(db)
        .await?;
        Ok(user)
    }

    pub async fn create(
        db: &PgPool,
        email: &str,
        password_hash: &str,
        nickname: &str,
    ) -> anyhow::Result<User> {
        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (email, password_hash, nickname)
            VALUES ($1, $2, $3)
            RETURNING id, email, password_hash, nickname, image, status, created_at
            "#,
        )
        .bind(email)
        .bind(password_hash)
        .bind(nickname)
        .fetch_one(db)
        .await?;
        Ok(user)
    }

    pub async fn update_nickname(
        db: &PgPool,
        id: Uuid,
        nickname: &str,
    ) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            UPDATE users SET nickname = $2
            WHERE id = $1
            RETURNING id, email, password_hash, nickname, image, status, created_at
            "#,
        )
        .bind(id)
        .bind(nickname)
        .fetch_optional(db)
        .await?;
        Ok(user)
    }

    pub async fn update_image(
        db: &PgPool,
        id: Uuid,
        image: Option<&str>,
    ) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            UPDATE users SET image = $2
            WHERE id = $1
            RETURNING id, email, password_hash, nickname, image, status, created_at
            "#,
        )
        .bind(id)
        .bind(image)
        .fetch_optional(db)
        .await?;
        Ok(user)
    }
}
