use chrono::Utc;
use std::time::Duration;

use super::schema::Database;
use super::types::{Feed, StorageError};

impl Database {
    // ========================================================================
    // Feed Operations
    // ========================================================================

    /// Register a feed, or update its name if the URL is already known.
    ///
    /// Returns the stored row. This is the operational seeding path
    /// (`gleaner --add <url>`); the scraper itself never creates feeds.
    pub async fn add_feed(&self, name: &str, url: &str) -> Result<Feed, StorageError> {
        let now = Utc::now().timestamp();
        let feed = sqlx::query_as::<_, Feed>(
            r#"
            INSERT INTO feeds (name, url, created_at)
            VALUES (?, ?, ?)
            ON CONFLICT(url) DO UPDATE SET name = excluded.name
            RETURNING id, name, url, last_fetched, created_at
        "#,
        )
        .bind(name)
        .bind(url)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;
        Ok(feed)
    }

    /// Select up to `limit` feeds due for a refresh.
    ///
    /// A feed is due when it has never been fetched, or when its last fetch
    /// is at least `min_age` seconds old. Never-fetched feeds come first
    /// (NULL sorts lowest in SQLite's ascending order), then the longest
    /// overdue, with `id` as the deterministic tie-break.
    pub async fn select_due_feeds(
        &self,
        limit: i64,
        min_age: Duration,
    ) -> Result<Vec<Feed>, StorageError> {
        let cutoff = Utc::now().timestamp() - min_age.as_secs() as i64;
        let feeds = sqlx::query_as::<_, Feed>(
            r#"
            SELECT id, name, url, last_fetched, created_at
            FROM feeds
            WHERE last_fetched IS NULL OR last_fetched <= ?
            ORDER BY last_fetched ASC, id ASC
            LIMIT ?
        "#,
        )
        .bind(cutoff)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(feeds)
    }

    /// Record that a feed was fetched now, returning the updated row.
    ///
    /// Idempotent, and `last_fetched` never moves backwards: the stored value
    /// is `MAX(last_fetched, now)`, so a late writer cannot rewind a feed's
    /// schedule.
    pub async fn mark_fetched(&self, feed_id: i64) -> Result<Feed, StorageError> {
        let now = Utc::now().timestamp();
        let feed = sqlx::query_as::<_, Feed>(
            r#"
            UPDATE feeds
            SET last_fetched = MAX(COALESCE(last_fetched, 0), ?)
            WHERE id = ?
            RETURNING id, name, url, last_fetched, created_at
        "#,
        )
        .bind(now)
        .bind(feed_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(feed)
    }

    /// List all feeds, oldest first. Operational visibility only.
    pub async fn list_feeds(&self) -> Result<Vec<Feed>, StorageError> {
        let feeds = sqlx::query_as::<_, Feed>(
            "SELECT id, name, url, last_fetched, created_at FROM feeds ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(feeds)
    }
}
