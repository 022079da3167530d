use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::books::repo::{Book, FeedRow};

/// Request body for book creation. `rating` is left as a raw JSON value so a
/// numeric string like `"3"` can be coerced instead of rejected.
#[derive(Debug, Deserialize)]
pub struct CreateBookRequest {
    pub title: Option<String>,
    pub caption: Option<String>,
    pub rating: Option<serde_json::Value>,
    pub image: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BookResponse {
    pub id: Uuid,
    pub title: String,
    pub caption: String,
    pub rating: i32,
    pub image: String,
    /// Owner id.
    pub user: Uuid,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl From<Book> for BookResponse {
    fn from(book: Book) -> Self {
        Self {
            id: book.id,
            title: book.title,
            caption: book.caption,
            rating: book.rating,
            image: book.image,
            user: book.user_id,
            created_at: book.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedOwner {
    pub username: String,
    pub profile_image: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedBook {
    pub id: Uuid,
    pub title: String,
    pub caption: String,
    pub rating: i32,
    pub image: String,
    pub user: FeedOwner,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl From<FeedRow> for FeedBook {
    fn from(row: FeedRow) -> Self {
        Self {
            id: row.id,
            title: row.title,
            caption: row.caption,
            rating: row.rating,
            image: row.image,
            user: FeedOwner {
                username: row.username,
                profile_image: row.profile_image,
            },
            created_at: row.created_at,
        }
    }
}

/// Raw pagination input. Kept as strings so bad values can fall back to the
/// defaults instead of failing query extraction.
#[derive(Debug, Deserialize)]
pub struct FeedQuery {
    pub page: Option<String>,
    pub limit: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedResponse {
    pub books: Vec<FeedBook>,
    pub current_page: i64,
    pub total_books: i64,
    pub total_pages: i64,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}
