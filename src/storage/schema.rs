use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    SqlitePool,
};
use std::str::FromStr;
use std::time::Duration;

use super::types::StorageError;

// ============================================================================
// Database
// ============================================================================

/// Handle to the SQLite store. Cheap to clone; all clones share one pool.
///
/// The pool supports concurrent access from every worker in a scraping round:
/// workers write to different feeds in parallel, and concurrent duplicate
/// insert attempts for the same (feed, url) pair resolve through the unique
/// index rather than through any in-process locking.
#[derive(Clone)]
pub struct Database {
    pub(crate) pool: SqlitePool,
}

impl Database {
    /// Open a database connection and run migrations.
    ///
    /// Pass `":memory:"` for an ephemeral database (used throughout the
    /// test suite).
    pub async fn open(path: &str) -> Result<Self, StorageError> {
        let url = format!("sqlite:{}?mode=rwc", path);

        // busy_timeout=5000: SQLite waits up to 5 seconds for locks to release
        // before returning SQLITE_BUSY. Handles transient contention between
        // concurrent workers in the same round.
        let options = SqliteConnectOptions::from_str(&url)
            .map_err(StorageError::Other)?
            .pragma("busy_timeout", "5000");
        // SQLite is single-writer; 5 connections covers peak concurrent
        // readers plus the writer during a round's fan-out.
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .acquire_timeout(Duration::from_secs(10))
            .connect_with(options)
            .await
            .map_err(StorageError::Other)?;
        let db = Self { pool };
        db.migrate().await?;
        Ok(db)
    }

    /// Run database migrations atomically within a transaction.
    ///
    /// All statements use `IF NOT EXISTS`, so re-running on an existing
    /// database is a no-op. If any step fails the transaction rolls back,
    /// leaving the previous schema intact.
    async fn migrate(&self) -> Result<(), StorageError> {
        // Enable foreign keys (per-connection setting, outside the transaction)
        sqlx::query("PRAGMA foreign_keys = ON")
            .execute(&self.pool)
            .await?;

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| StorageError::Migration(e.to_string()))?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS feeds (
                id INTEGER PRIMARY KEY,
                name TEXT NOT NULL,
                url TEXT UNIQUE NOT NULL,
                last_fetched INTEGER,
                created_at INTEGER NOT NULL
            )
        "#,
        )
        .execute(&mut *tx)
        .await
        .map_err(|e| StorageError::Migration(e.to_string()))?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS posts (
                id INTEGER PRIMARY KEY,
                feed_id INTEGER NOT NULL REFERENCES feeds(id) ON DELETE CASCADE,
                title TEXT NOT NULL,
                description TEXT,
                published INTEGER NOT NULL,
                url TEXT NOT NULL,
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL,
                UNIQUE(feed_id, url)
            )
        "#,
        )
        .execute(&mut *tx)
        .await
        .map_err(|e| StorageError::Migration(e.to_string()))?;

        // Due-feed selection filters and orders on last_fetched
        sqlx::query("CREATE INDEX IF NOT EXISTS idx_feeds_last_fetched ON feeds(last_fetched)")
            .execute(&mut *tx)
            .await
            .map_err(|e| StorageError::Migration(e.to_string()))?;

        // Newest-first post listings per feed
        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_posts_feed_published ON posts(feed_id, published DESC)",
        )
        .execute(&mut *tx)
        .await
        .map_err(|e| StorageError::Migration(e.to_string()))?;

        tx.commit()
            .await
            .map_err(|e| StorageError::Migration(e.to_string()))?;

        Ok(())
    }

    /// Close the connection pool. Subsequent operations fail with a
    /// `StorageError`, which is how the tests simulate unreachable storage.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}
