use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use time::OffsetDateTime;
use uuid::Uuid;

/// Metadata row for an uploaded file; the bytes live in object storage
/// under `filepath`.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Attachment {
    pub id: Uuid,
    pub target_type: String,
    pub target: String,
    pub origin_name: String,
    pub filepath: String,
    pub ext: String,
    pub is_image: bool,
    pub created_at: OffsetDateTime,
}

impl Attachment {
    pub async fn create(
        db: &PgPool,
        target_type: &str,
        target: &str,
        origin_name: &str,
        filepath: &str,
        ext: &str,
        is_image: bool,
    ) -> anyhow::Result<Attachment> {
        let attachment = sqlx::query_as::<_, Attachment>(
            r#"
            INSERT INTO attachments (target_type, target, origin_name, filepath, ext, is_image)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id, target_type, target, origin_name, filepath, ext, is_image, created_at
            "#,
        )
        .bind(target_type)
        .bind(target)
        .bind(origin_name)
        .bind(filepath)
        .bind(ext)
        .bind(is_image)
        .fetch_one(db)
        .await?;
        Ok(attachment)
    }

    pub async fn find_by_id(db: &PgPool, id: Uuid) -> anyhow::Result<Option<Attachment>> {
        let attachment = sqlx::query_as::<_, Attachment>(
            r#"
            SELECT id, target_type, target, origin_name, filepath, ext, is_image, created_at
            FROM attachments
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(db)
        .await?;
        Ok(attachment)
    }

    pub async fn find_by_filepath(db: &PgPool, filepath: &str) -> anyhow::Result<Option<Attachment>> {
        let attachment = sqlx::query_as::<_, Attachment>(
            r#"
            SELECT id, target_type, target, origin_name, filepath, ext, is_image, created_at
            FROM attachments
            WHERE filepath = $1
            "#,
        )
        .bind(filepath)
        .fetch_optional(db)
        .await?;
        Ok(attachment)
    }

    pub async fn delete(db: &PgPool, id: Uuid) -> anyhow::Result<()> {
        sqlx::query("DELETE FROM attachments WHERE id = $1")
            .bind(id)
            .execute(db)
            .await?;
        Ok(())
    }
}
