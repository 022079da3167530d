use axum::{
    extract::{DefaultBodyLimit, Path, Query, State},
    http::StatusCode,
    routing::{delete, get, post},
    Json, Router,
};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::{
    auth::jwt::AuthUser,
    books::{
        dto::{BookResponse, CreateBookRequest, FeedBook, FeedQuery, FeedResponse, MessageResponse},
        image::parse_data_uri,
        repo::Book,
    },
    error::{ApiError, ApiResult},
    state::AppState,
    storage::{object_key_from_url, StorageClient},
};

const DEFAULT_PAGE: i64 = 1;
const DEFAULT_LIMIT: i64 = 5;

pub fn read_routes() -> Router<AppState> {
    Router::new()
        .route("/books", get(list_books))
        .route("/books/user", get(list_my_books))
}

pub fn write_routes() -> Router<AppState> {
    Router::new()
        .route("/books", post(create_book))
        .route("/books/:id", delete(delete_book))
        .layer(DefaultBodyLimit::max(20 * 1024 * 1024)) // data-URI images
}

fn internal(state: &AppState, err: anyhow::Error) -> ApiError {
    ApiError::internal(err, state.config.expose_errors())
}

fn missing_fields() -> ApiError {
    ApiError::Validation("Please provide all fields".into())
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Accepts a JSON number or a numeric string; the result must be a finite
/// integer in [1,5].
fn coerce_rating(value: &serde_json::Value) -> Result<i32, &'static str> {
    const MSG: &str = "Rating must be a number between 1 and 5";
    let n = match value {
        serde_json::Value::Number(n) => n
            .as_i64()
            .or_else(|| {
                n.as_f64()
                    .filter(|f| f.is_finite() && f.fract() == 0.0)
                    .map(|f| f as i64)
            })
            .ok_or(MSG)?,
        serde_json::Value::String(s) => s.trim().parse::<i64>().map_err(|_| MSG)?,
        _ => return Err(MSG),
    };
    if (1..=5).contains(&n) {
        Ok(n as i32)
    } else {
        Err(MSG)
    }
}

/// Invalid or sub-1 pagination input falls back to the default, never errors.
fn parse_page_param(raw: Option<&str>, default: i64) -> i64 {
    raw.and_then(|v| v.trim().parse::<i64>().ok())
        .filter(|v| *v >= 1)
        .unwrap_or(default)
}

fn total_pages(total_books: i64, limit: i64) -> i64 {
    (total_books + limit - 1) / limit
}

#[instrument(skip(state, payload))]
pub async fn create_book(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Json(payload): Json<CreateBookRequest>,
) -> ApiResult<(StatusCode, Json<BookResponse>)> {
    let title = non_empty(payload.title).ok_or_else(missing_fields)?;
    let caption = non_empty(payload.caption).ok_or_else(missing_fields)?;
    let image = non_empty(payload.image).ok_or_else(missing_fields)?;
    let rating_raw = payload
        .rating
        .filter(|v| !v.is_null())
        .ok_or_else(missing_fields)?;

    let rating = coerce_rating(&rating_raw).map_err(|m| ApiError::Validation(m.into()))?;
    let upload = parse_data_uri(&image).map_err(|m| ApiError::Validation(m.into()))?;

    let key = format!("books/{}", Uuid::new_v4());
    state
        .storage
        .put_object(&key, upload.bytes, &upload.content_type)
        .await
        .map_err(|e| internal(&state, e))?;
    let image_url = state.storage.public_url(&key);

    let book = Book::create(&state.db, user_id, &title, &caption, rating, &image_url)
        .await
        .map_err(|e| internal(&state, e))?;

    info!(book_id = %book.id, user_id = %user_id, "book created");
    Ok((StatusCode::CREATED, Json(book.into())))
}

#[instrument(skip(state))]
pub async fn list_books(
    State(state): State<AppState>,
    Query(q): Query<FeedQuery>,
) -> ApiResult<Json<FeedResponse>> {
    let page = parse_page_param(q.page.as_deref(), DEFAULT_PAGE);
    let limit = parse_page_param(q.limit.as_deref(), DEFAULT_LIMIT);
    let offset = (page - 1) * limit;

    let rows = Book::feed_page(&state.db, limit, offset)
        .await
        .map_err(|e| internal(&state, e))?;
    let total_books = Book::count(&state.db)
        .await
        .map_err(|e| internal(&state, e))?;

    Ok(Json(FeedResponse {
        books: rows.into_iter().map(FeedBook::from).collect(),
        current_page: page,
        total_books,
        total_pages: total_pages(total_books, limit),
    }))
}

#[instrument(skip(state))]
pub async fn list_my_books(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> ApiResult<Json<Vec<BookResponse>>> {
    let books = Book::list_by_owner(&state.db, user_id)
        .await
        .map_err(|e| internal(&state, e))?;
    Ok(Json(books.into_iter().map(BookResponse::from).collect()))
}

#[instrument(skip(state))]
pub async fn delete_book(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<MessageResponse>> {
    let book = Book::find_by_id(&state.db, id)
        .await
        .map_err(|e| internal(&state, e))?
        .ok_or_else(|| ApiError::NotFound("Book not found".into()))?;

    if book.user_id != user_id {
        warn!(book_id = %id, caller = %user_id, "delete denied, caller is not the owner");
        return Err(ApiError::Forbidden);
    }

    remove_stored_image(
        state.storage.as_ref(),
        &book.image,
        &state.config.storage.public_url,
    )
    .await;

    Book::delete(&state.db, id)
        .await
        .map_err(|e| internal(&state, e))?;

    info!(book_id = %id, user_id = %user_id, "book deleted");
    Ok(Json(MessageResponse {
        message: "Book deleted successfully".into(),
    }))
}

/// Best-effort remote cleanup. The book row is the source of truth; an
/// orphaned object is preferred over a failed delete, so storage errors are
/// logged and dropped.
async fn remove_stored_image(storage: &dyn StorageClient, image_url: &str, public_base: &str) {
    let Some(key) = object_key_from_url(image_url, public_base) else {
        return;
    };
    if let Err(e) = storage.delete_object(&key).await {
        warn!(error = %e, key = %key, "failed to delete stored image");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn rating_accepts_integers_and_numeric_strings() {
        assert_eq!(coerce_rating(&json!(3)), Ok(3));
        assert_eq!(coerce_rating(&json!(1)), Ok(1));
        assert_eq!(coerce_rating(&json!(5)), Ok(5));
        assert_eq!(coerce_rating(&json!("3")), Ok(3));
        assert_eq!(coerce_rating(&json!(4.0)), Ok(4));
    }

    #[test]
    fn rating_rejects_out_of_range_and_non_integers() {
        assert!(coerce_rating(&json!(0)).is_err());
        assert!(coerce_rating(&json!(6)).is_err());
        assert!(coerce_rating(&json!("abc")).is_err());
        assert!(coerce_rating(&json!(3.7)).is_err());
        assert!(coerce_rating(&json!([3])).is_err());
        assert!(coerce_rating(&json!(true)).is_err());
    }

    #[test]
    fn pagination_falls_back_on_bad_input() {
        assert_eq!(parse_page_param(None, DEFAULT_PAGE), 1);
        assert_eq!(parse_page_param(Some("3"), DEFAULT_PAGE), 3);
        assert_eq!(parse_page_param(Some("abc"), DEFAULT_LIMIT), 5);
        assert_eq!(parse_page_param(Some("0"), DEFAULT_PAGE), 1);
        assert_eq!(parse_page_param(Some("-2"), DEFAULT_LIMIT), 5);
        assert_eq!(parse_page_param(Some(" 7 "), DEFAULT_LIMIT), 7);
    }

    #[test]
    fn total_pages_is_a_ceiling() {
        // 5 posts at limit 2 span 3 pages
        assert_eq!(total_pages(5, 2), 3);
        assert_eq!(total_pages(4, 2), 2);
        assert_eq!(total_pages(0, 5), 0);
        assert_eq!(total_pages(1, 5), 1);
    }

    #[test]
    fn empty_create_fields_count_as_missing() {
        assert_eq!(non_empty(Some("  ".into())), None);
        assert_eq!(non_empty(None), None);
        assert_eq!(non_empty(Some(" Dune ".into())).as_deref(), Some("Dune"));
    }

    mod cleanup {
        use super::super::remove_stored_image;
        use crate::storage::StorageClient;
        use axum::async_trait;
        use bytes::Bytes;
        use std::sync::atomic::{AtomicUsize, Ordering};

        struct FailingStorage {
            delete_calls: AtomicUsize,
        }

        #[async_trait]
        impl StorageClient for FailingStorage {
            async fn put_object(&self, _k: &str, _b: Bytes, _ct: &str) -> anyhow::Result<()> {
                Ok(())
            }
            async fn delete_object(&self, _k: &str) -> anyhow::Result<()> {
                self.delete_calls.fetch_add(1, Ordering::SeqCst);
                anyhow::bail!("object store unavailable")
            }
            fn public_url(&self, k: &str) -> String {
                format!("https://cdn.example.com/bookworm/{}", k)
            }
        }

        #[tokio::test]
        async fn storage_failure_is_swallowed() {
            let storage = FailingStorage {
                delete_calls: AtomicUsize::new(0),
            };
            // Must return despite the failing delete.
            remove_stored_image(
                &storage,
                "https://cdn.example.com/bookworm/books/abc",
                "https://cdn.example.com/bookworm",
            )
            .await;
            assert_eq!(storage.delete_calls.load(Ordering::SeqCst), 1);
        }

        #[tokio::test]
        async fn foreign_urls_are_left_alone() {
            let storage = FailingStorage {
                delete_calls: AtomicUsize::new(0),
            };
            remove_stored_image(
                &storage,
                "https://api.dicebear.com/7.x/avataaars/svg?seed=ann",
                "https://cdn.example.com/bookworm",
            )
            .await;
            assert_eq!(storage.delete_calls.load(Ordering::SeqCst), 0);
        }
    }
}
