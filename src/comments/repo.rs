use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Comment {
    pub id: Uuid,
    pub post_id: Uuid,
    pub author_id: Uuid,
    pub content: String,
    pub status: String, // Y/N/T/H
    pub created_at: OffsetDateTime,
}

impl Comment {
    pub async fn create(
        db: &PgPool,
        post_id: Uuid,
        author_id: Uuid,
        content: &str,
        status: &str,
    ) -> anyhow::Result<Comment> {
        let comment = sqlx::query_as::<_, Comment>(
            r#"
            INSERT INTO comments (post_id, author_id, content, status)
            VALUES ($1, $2, $3, $4)
            RETURNING id, post_id, author_id, content, status, created_at
            "#,
        )
        .bind(post_id)
        .bind(author_id)
        .bind(content)
        .bind(status)
        .fetch_one(db)
        .await?;
        Ok(comment)
    }
}
