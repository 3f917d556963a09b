use thiserror::Error;

// ============================================================================
// Error Types
// ============================================================================

/// Storage-layer errors.
///
/// Every storage operation returns `Result<_, StorageError>`; a failure is
/// always a distinct value, never a silent empty result. Duplicate post
/// insertion is NOT an error — it is reported as
/// [`InsertOutcome::AlreadyExists`] by
/// [`insert_post`](crate::storage::Database::insert_post).
#[derive(Debug, Error)]
pub enum StorageError {
    /// Migration failed
    #[error("Database migration failed: {0}")]
    Migration(String),

    /// Generic database error
    #[error("Database error: {0}")]
    Other(#[from] sqlx::Error),
}

// ============================================================================
// Data Structures
// ============================================================================

/// Feed row from the database.
///
/// `last_fetched` is a Unix timestamp in seconds; `None` means the feed has
/// never been fetched. The value only moves forward: `mark_fetched` writes
/// `MAX(last_fetched, now)`.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct Feed {
    pub id: i64,
    pub name: String,
    pub url: String,
    pub last_fetched: Option<i64>,
    pub created_at: i64,
}

/// Durable record of one item discovered within a feed's document.
///
/// Posts are insert-only: the scraper never updates or deletes them, and
/// `UNIQUE(feed_id, url)` makes re-insertion a no-op.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Post {
    pub id: i64,
    pub feed_id: i64,
    pub title: String,
    pub description: Option<String>,
    pub published: i64,
    pub url: String,
    pub created_at: i64,
    pub updated_at: i64,
}

/// A post candidate produced by a feed worker, not yet persisted.
#[derive(Debug, Clone)]
pub struct NewPost {
    pub feed_id: i64,
    pub title: String,
    pub description: Option<String>,
    pub published: i64,
    pub url: String,
}

/// Outcome of a post insertion attempt.
///
/// The structured replacement for sniffing "duplicate key" out of an error
/// message: the unique index on `(feed_id, url)` turns a re-discovered item
/// into `AlreadyExists` instead of an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    /// A new row was created.
    Created,
    /// A post with this (feed_id, url) pair already exists; nothing changed.
    AlreadyExists,
}
