use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Post {
    pub id: Uuid,
    pub author_id: Uuid,
    pub title: String,
    pub content: String,
    pub thumbnail: String,
    pub status: String, // Y/N/T/H
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

/// Post row joined with its author's public fields for list views.
#[derive(Debug, Clone, FromRow)]
pub struct PostWithAuthor {
    pub id: Uuid,
    pub title: String,
    pub content: String,
    pub thumbnail: String,
    pub status: String,
    pub created_at: OffsetDateTime,
    pub author_id: Uuid,
    pub author_nickname: String,
}

impl Post {
    pub async fn create(
        db: &PgPool,
        author_id: Uuid,
        title: &str,
        content: &str,
        thumbnail: &str,
        status: &str,
    ) -> anyhow::Result<Post> {
        let post = sqlx::query_as::<_, Post>(
            r#"
            INSERT INTO posts (author_id, title, content, thumbnail, status)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, author_id, title, content, thumbnail, status, created_at, updated_at
            "#,
        )
        .bind(author_id)
        .bind(title)
        .bind(content)
        .bind(thumbnail)
        .bind(status)
        .fetch_one(db)
        .await?;
        Ok(post)
    }

    /// Active posts only, newest first, with the author joined in.
    pub async fn list_active(
        db: &PgPool,
        limit: i64,
        offset: i64,
    ) -> anyhow::Result<Vec<PostWithAuthor>> {
        let rows = sqlx::query_as::<_, PostWithAuthor>(
            r#"
            SELECT p.id, p.title, p.content, p.thumbnail, p.status, p.created_at,
                   u.id AS author_id, u.nickname AS author_nickname
            FROM posts p
            JOIN users u ON u.id = p.author_id
            WHERE p.status = 'Y'
            ORDER BY p.created_at DESC
            LIMIT $1 OFFSET $2
            "#,
        )
        .bind(limit)
        .bind(offset)
        .fetch_all(db)
        .await?;
        Ok(rows)
    }

    pub async fn count_active(db: &PgPool) -> anyhow::Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM posts WHERE status = 'Y'")
            .fetch_one(db)
            .await?;
        Ok(count)
    }
}
