use chrono::{DateTime, Utc};
use thiserror::Error;

/// A structurally invalid feed document. Fails the whole fetch for that feed;
/// missing optional fields never land here.
#[derive(Debug, Error)]
#[error("Parse error: {0}")]
pub struct ParseError(#[from] feed_rs::parser::ParseFeedError);

/// In-memory result of parsing one feed document.
///
/// Exists only for the duration of one refresh cycle, owned exclusively by
/// the worker that produced it.
#[derive(Debug, Clone)]
pub struct ParsedFeed {
    /// Channel title
    pub title: String,
    /// Channel description, when the document carries one
    pub description: Option<String>,
    /// Items in document order
    pub items: Vec<ParsedItem>,
    /// Entries dropped because they carried no link
    pub skipped_no_url: usize,
}

/// One entry of a parsed feed, a 1:1 candidate for a stored post.
#[derive(Debug, Clone)]
pub struct ParsedItem {
    pub title: String,
    pub description: Option<String>,
    /// `None` when the document's date is missing or unparseable; the worker
    /// skips such items rather than failing the batch.
    pub published: Option<DateTime<Utc>>,
    pub url: String,
}

/// Parse a feed document (RSS, Atom, or JSON Feed) into a [`ParsedFeed`].
///
/// Tolerant of absent optional fields: a missing description or an
/// unparseable date yields `None` on that item. Entries without any link
/// cannot become posts (the URL is the dedup key) and are dropped, counted
/// in `skipped_no_url`.
pub fn parse_feed(bytes: &[u8]) -> Result<ParsedFeed, ParseError> {
    let feed = feed_rs::parser::parse(bytes)?;

    let title = feed
        .title
        .map(|t| t.content)
        .unwrap_or_else(|| "Untitled".to_string());
    let description = feed.description.map(|d| d.content);

    let mut items = Vec::with_capacity(feed.entries.len());
    let mut skipped_no_url = 0;
    for entry in feed.entries {
        let Some(url) = entry.links.first().map(|l| l.href.clone()) else {
            skipped_no_url += 1;
            continue;
        };
        let item_title = entry
            .title
            .map(|t| t.content)
            .unwrap_or_else(|| "Untitled".to_string());
        let item_description = entry
            .summary
            .map(|s| s.content)
            .or_else(|| entry.content.and_then(|c| c.body));
        let published = entry.published.or(entry.updated);

        items.push(ParsedItem {
            title: item_title,
            description: item_description,
            published,
            url,
        });
    }

    Ok(ParsedFeed {
        title,
        description,
        items,
        skipped_no_url,
    })
}
