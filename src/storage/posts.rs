use chrono::Utc;

use super::schema::Database;
use super::types::{InsertOutcome, NewPost, Post, StorageError};

impl Database {
    // ========================================================================
    // Post Operations
    // ========================================================================

    /// Insert a post, or report that it already exists.
    ///
    /// Atomic: `INSERT OR IGNORE` against the `(feed_id, url)` unique index,
    /// with `rows_affected` distinguishing [`InsertOutcome::Created`] from
    /// [`InsertOutcome::AlreadyExists`]. Concurrent attempts for the same
    /// pair from sibling workers resolve to exactly one stored row.
    pub async fn insert_post(&self, post: &NewPost) -> Result<InsertOutcome, StorageError> {
        let now = Utc::now().timestamp();
        let result = sqlx::query(
            r#"
            INSERT INTO posts (feed_id, title, description, published, url, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(feed_id, url) DO NOTHING
        "#,
        )
        .bind(post.feed_id)
        .bind(&post.title)
        .bind(&post.description)
        .bind(post.published)
        .bind(&post.url)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() > 0 {
            Ok(InsertOutcome::Created)
        } else {
            Ok(InsertOutcome::AlreadyExists)
        }
    }

    /// Get all posts for a feed, newest publication first.
    pub async fn posts_for_feed(&self, feed_id: i64) -> Result<Vec<Post>, StorageError> {
        let posts = sqlx::query_as::<_, Post>(
            r#"
            SELECT id, feed_id, title, description, published, url, created_at, updated_at
            FROM posts
            WHERE feed_id = ?
            ORDER BY published DESC, id DESC
        "#,
        )
        .bind(feed_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(posts)
    }

    /// Count stored posts for a feed.
    pub async fn count_posts(&self, feed_id: i64) -> Result<i64, StorageError> {
        let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM posts WHERE feed_id = ?")
            .bind(feed_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(row.0)
    }
}
