use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use time::OffsetDateTime;
use uuid::Uuid;

/// Book record in the post store. `user_id` is a weak reference to the
/// owner, used for lookup and the ownership check only.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Book {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    pub caption: String,
    pub rating: i32,
    pub image: String,
    pub created_at: OffsetDateTime,
}

/// One public-feed row: a book joined with the two owner fields the feed
/// exposes.
#[derive(Debug, Clone, FromRow)]
pub struct FeedRow {
    pub id: Uuid,
    pub title: String,
    pub caption: String,
    pub rating: i32,
    pub image: String,
    pub created_at: OffsetDateTime,
    pub username: String,
    pub profile_image: String,
}

impl Book {
    pub async fn create(
        db: &PgPool,
        user_id: Uuid,
        title: &str,
        caption: &str,
        rating: i32,
        image: &str,
    ) -> anyhow::Result<Book> {
        let book = sqlx::query_as::<_, Book>(
            r#"
            INSERT INTO books (user_id, title, caption, rating, image)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, user_id, title, caption, rating, image, created_at
            "#,
        )
        .bind(user_id)
        .bind(title)
        .bind(caption)
        .bind(rating)
        .bind(image)
        .fetch_one(db)
        .await?;
        Ok(book)
    }

    /// Newest-first feed page. Ties on `created_at` keep store order.
    pub async fn feed_page(db: &PgPool, limit: i64, offset: i64) -> anyhow::Result<Vec<FeedRow>> {
        let rows = sqlx::query_as::<_, FeedRow>(
            r#"
            SELECT b.id, b.title, b.caption, b.rating, b.image, b.created_at,
                   u.username, u.profile_image
            FROM books b
            JOIN users u ON u.id = b.user_id
            ORDER BY b.created_at DESC
            LIMIT $1 OFFSET $2
            "#,
        )
        .bind(limit)
        .bind(offset)
        .fetch_all(db)
        .await?;
        Ok(rows)
    }

    pub async fn count(db: &PgPool) -> anyhow::Result<i64> {
        let total = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM books")
            .fetch_one(db)
            .await?;
        Ok(total)
    }

    pub async fn list_by_owner(db: &PgPool, user_id: Uuid) -> anyhow::Result<Vec<Book>> {
        let rows = sqlx::query_as::<_, Book>(
            r#"
            SELECT id, user_id, title, caption, rating, image, created_at
            FROM books
            WHERE user_id = $1
            ORDER BY created_at DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(db)
        .await?;
        Ok(rows)
    }

    pub async fn find_by_id(db: &PgPool, id: Uuid) -> anyhow::Result<Option<Book>> {
        let book = sqlx::query_as::<_, Book>(
            r#"
            SELECT id, user_id, title, caption, rating, image, created_at
            FROM books
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(db)
        .await?;
        Ok(book)
    }

    pub async fn delete(db: &PgPool, id: Uuid) -> anyhow::Result<()> {
        sqlx::query("DELETE FROM books WHERE id = $1")
            .bind(id)
            .execute(db)
            .await?;
        Ok(())
    }
}
