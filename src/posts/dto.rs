use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use super::repo::{Post, PostWithAuthor};

pub const POST_PAGE_SIZE: i64 = 8;

/// Y = active, N = inactive, T = temp-saved draft, H = hidden.
pub const VALID_STATUSES: [&str; 4] = ["Y", "N", "T", "H"];

#[derive(Debug, Deserialize)]
pub struct CreatePostRequest {
    pub title: String,
    pub content: String,
    pub thumbnail: String,
    pub status: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct TempSavePostRequest {
    pub title: String,
    pub content: Option<String>,
    pub thumbnail: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PageQuery {
    pub page: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub success: bool,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct TempSaveResponse {
    pub success: bool,
    pub message: String,
    pub data: Post,
}

#[derive(Debug, Serialize)]
pub struct PostAuthor {
    pub id: Uuid,
    pub nickname: String,
}

#[derive(Debug, Serialize)]
pub struct PostListItem {
    pub id: Uuid,
    pub title: String,
    pub content: String,
    pub thumbnail: String,
    pub status: String,
    pub created_at: OffsetDateTime,
    pub author: PostAuthor,
}

impl From<PostWithAuthor> for PostListItem {
    fn from(row: PostWithAuthor) -> Self {
        Self {
            id: row.id,
            title: row.title,
            content: row.content,
            thumbnail: row.thumbnail,
            status: row.status,
            created_at: row.created_at,
            author: PostAuthor {
                id: row.author_id,
                nickname: row.author_nickname,
            },
        }
    }
}

#[derive(Debug, Serialize)]
pub struct Pagination {
    pub current_page: i64,
    pub page_size: i64,
    pub total_count: i64,
    pub total_pages: i64,
    pub has_next_page: bool,
    pub has_prev_page: bool,
}

impl Pagination {
    pub fn build(page: i64, page_size: i64, total_count: i64) -> Self {
        let total_pages = if total_count == 0 {
            0
        } else {
            (total_count + page_size - 1) / page_size
        };
        Self {
            current_page: page,
            page_size,
            total_count,
            total_pages,
            has_next_page: page < total_pages,
            has_prev_page: page > 1,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct PostsPage {
    pub posts: Vec<PostListItem>,
    pub pagination: Pagination,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pagination_math_on_partial_last_page() {
        let p = Pagination::build(1, 8, 17);
        assert_eq!(p.total_pages, 3);
        assert!(p.has_next_page);
        assert!(!p.has_prev_page);
    }

    #[test]
    fn pagination_math_on_exact_boundary() {
        let p = Pagination::build(2, 8, 16);
        assert_eq!(p.total_pages, 2);
        assert!(!p.has_next_page);
        assert!(p.has_prev_page);
    }

    #[test]
    fn pagination_math_on_empty_set() {
        let p = Pagination::build(1, 8, 0);
        assert_eq!(p.total_pages, 0);
        assert!(!p.has_next_page);
        assert!(!p.has_prev_page);
    }
}
