use std::time::Duration;
use thiserror::Error;

use crate::feed::{fetch, parse_feed, FetchError, ParseError};
use crate::storage::{Database, Feed, InsertOutcome, NewPost, StorageError};

/// A feed refresh attempt that produced no reconciliation.
///
/// Fetch and parse failures leave `last_fetched` untouched, so the feed is
/// selected again on a future round; failure is never mistaken for "already
/// processed". `MarkFetched` means the document was retrieved but the
/// schedule update failed — the next round refetches, and the unique index
/// on posts absorbs the duplicate work.
#[derive(Debug, Error)]
pub enum RefreshError {
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error("Failed to mark feed fetched: {0}")]
    MarkFetched(StorageError),
}

/// What one successful refresh observed, for logging and tests.
#[derive(Debug)]
pub struct RefreshOutcome {
    pub feed_id: i64,
    pub feed_name: String,
    /// Entries present in the fetched document
    pub items_seen: usize,
    /// Posts newly created this refresh
    pub posts_created: usize,
    /// Items skipped (no usable date, no link, or insertion failure)
    pub items_skipped: usize,
}

/// Perform exactly one refresh attempt for one feed.
///
/// Steps: fetch + parse, advance the feed's schedule, then reconcile items
/// one by one. Items are independent — a malformed date or a failed insert
/// skips that item only, and a rediscovered item
/// ([`InsertOutcome::AlreadyExists`]) is a quiet no-op. Partial success is
/// the normal case, not a fault.
///
/// The fetched timestamp is advanced BEFORE item reconciliation: a crash
/// mid-reconciliation loses at most one fetch's worth of items (upstream
/// feeds re-list recent items), instead of pinning the feed at the front of
/// every future round.
pub async fn refresh_feed(
    db: &Database,
    client: &reqwest::Client,
    feed: &Feed,
    fetch_timeout: Duration,
) -> Result<RefreshOutcome, RefreshError> {
    let bytes = fetch(client, &feed.url, fetch_timeout).await?;
    let parsed = parse_feed(&bytes)?;

    if parsed.skipped_no_url > 0 {
        tracing::warn!(
            feed = %feed.url,
            skipped = parsed.skipped_no_url,
            "Items without a link skipped"
        );
    }

    db.mark_fetched(feed.id)
        .await
        .map_err(RefreshError::MarkFetched)?;

    let items_seen = parsed.items.len() + parsed.skipped_no_url;
    let mut posts_created = 0;
    let mut items_skipped = parsed.skipped_no_url;

    for item in parsed.items {
        let Some(published) = item.published else {
            tracing::warn!(
                feed = %feed.url,
                title = %item.title,
                "Item has no usable publication date, skipping"
            );
            items_skipped += 1;
            continue;
        };

        let post = NewPost {
            feed_id: feed.id,
            title: item.title,
            description: item.description,
            published: published.timestamp(),
            url: item.url,
        };

        match db.insert_post(&post).await {
            Ok(InsertOutcome::Created) => posts_created += 1,
            Ok(InsertOutcome::AlreadyExists) => {}
            Err(e) => {
                tracing::warn!(
                    feed = %feed.url,
                    url = %post.url,
                    error = %e,
                    "Failed to insert post, skipping item"
                );
                items_skipped += 1;
            }
        }
    }

    Ok(RefreshOutcome {
        feed_id: feed.id,
        feed_name: feed.name.clone(),
        items_seen,
        posts_created,
        items_skipped,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const TIMEOUT: Duration = Duration::from_secs(5);

    async fn serve_feed(body: &str) -> MockServer {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(body)
                    .insert_header("Content-Type", "application/xml"),
            )
            .mount(&mock_server)
            .await;
        mock_server
    }

    fn feed_with_items() -> String {
        r#"<?xml version="1.0"?>
<rss version="2.0"><channel><title>Blog</title>
  <item><title>One</title><link>https://example.com/1</link>
    <description>first</description>
    <pubDate>Mon, 01 Jan 2024 00:00:00 +0000</pubDate></item>
  <item><title>Two</title><link>https://example.com/2</link>
    <pubDate>Tue, 02 Jan 2024 00:00:00 +0000</pubDate></item>
  <item><title>Three</title><link>https://example.com/3</link>
    <pubDate>Wed, 03 Jan 2024 00:00:00 +0000</pubDate></item>
  <item><title>Broken</title><link>https://example.com/4</link>
    <pubDate>never o'clock</pubDate></item>
</channel></rss>"#
            .to_string()
    }

    #[tokio::test]
    async fn test_refresh_inserts_valid_items_skips_bad_date() {
        let server = serve_feed(&feed_with_items()).await;
        let db = Database::open(":memory:").await.unwrap();
        let feed = db
            .add_feed("Blog", &format!("{}/rss", server.uri()))
            .await
            .unwrap();

        let client = reqwest::Client::new();
        let outcome = refresh_feed(&db, &client, &feed, TIMEOUT).await.unwrap();

        assert_eq!(outcome.items_seen, 4);
        assert_eq!(outcome.posts_created, 3);
        assert_eq!(outcome.items_skipped, 1);
        assert_eq!(db.count_posts(feed.id).await.unwrap(), 3);

        let refreshed = db.list_feeds().await.unwrap();
        assert!(
            refreshed[0].last_fetched.is_some(),
            "schedule advanced after successful fetch"
        );
    }

    #[tokio::test]
    async fn test_refetch_creates_no_duplicates() {
        let server = serve_feed(&feed_with_items()).await;
        let db = Database::open(":memory:").await.unwrap();
        let feed = db
            .add_feed("Blog", &format!("{}/rss", server.uri()))
            .await
            .unwrap();
        let client = reqwest::Client::new();

        refresh_feed(&db, &client, &feed, TIMEOUT).await.unwrap();
        let first_fetch = db.list_feeds().await.unwrap()[0].last_fetched.unwrap();

        let outcome = refresh_feed(&db, &client, &feed, TIMEOUT).await.unwrap();
        assert_eq!(outcome.posts_created, 0, "all items already recorded");
        assert_eq!(db.count_posts(feed.id).await.unwrap(), 3);

        let second_fetch = db.list_feeds().await.unwrap()[0].last_fetched.unwrap();
        assert!(second_fetch >= first_fetch, "schedule still advances");
    }

    #[tokio::test]
    async fn test_fetch_failure_leaves_schedule_untouched() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&mock_server)
            .await;

        let db = Database::open(":memory:").await.unwrap();
        let feed = db
            .add_feed("Down", &format!("{}/rss", mock_server.uri()))
            .await
            .unwrap();

        let client = reqwest::Client::new();
        let err = refresh_feed(&db, &client, &feed, TIMEOUT).await.unwrap_err();
        assert!(matches!(err, RefreshError::Fetch(_)));

        let feeds = db.list_feeds().await.unwrap();
        assert!(
            feeds[0].last_fetched.is_none(),
            "failure must not look like a completed fetch"
        );
        assert_eq!(db.count_posts(feed.id).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_malformed_document_is_parse_error() {
        let server = serve_feed("<definitely not a feed").await;
        let db = Database::open(":memory:").await.unwrap();
        let feed = db
            .add_feed("Garbage", &format!("{}/rss", server.uri()))
            .await
            .unwrap();

        let client = reqwest::Client::new();
        let err = refresh_feed(&db, &client, &feed, TIMEOUT).await.unwrap_err();
        assert!(matches!(err, RefreshError::Parse(_)));
        assert!(db.list_feeds().await.unwrap()[0].last_fetched.is_none());
    }

    #[tokio::test]
    async fn test_empty_feed_records_zero_posts() {
        let server = serve_feed(
            r#"<?xml version="1.0"?><rss version="2.0"><channel><title>quiet</title></channel></rss>"#,
        )
        .await;
        let db = Database::open(":memory:").await.unwrap();
        let feed = db
            .add_feed("Quiet", &format!("{}/rss", server.uri()))
            .await
            .unwrap();

        let client = reqwest::Client::new();
        let outcome = refresh_feed(&db, &client, &feed, TIMEOUT).await.unwrap();
        assert_eq!(outcome.items_seen, 0);
        assert_eq!(outcome.posts_created, 0);
        assert!(db.list_feeds().await.unwrap()[0].last_fetched.is_some());
    }
}
