use futures::stream::{self, StreamExt};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::scraper::worker::refresh_feed;
use crate::storage::Database;

/// Tunables for the scraping loop.
///
/// `concurrency` bounds both the feeds selected per round and the workers in
/// flight. They coincide today, but the fan-out is gated on `concurrency`
/// independently of the batch size, so a larger selection window could be
/// introduced without unbounding parallel fetches.
#[derive(Debug, Clone)]
pub struct ScraperConfig {
    /// Max feeds per round and max parallel workers
    pub concurrency: usize,
    /// Start-of-round to start-of-next-round sleep
    pub interval: Duration,
    /// Minimum age of a fetch before the feed counts as due again
    pub min_feed_age: Duration,
    /// Per-HTTP-request bound inside a worker
    pub fetch_timeout: Duration,
    /// Bound on a whole worker (fetch + parse + reconcile); keep below
    /// `interval` so a hung feed cannot stall the cadence
    pub worker_timeout: Duration,
}

impl Default for ScraperConfig {
    fn default() -> Self {
        Self {
            concurrency: 10,
            interval: Duration::from_secs(60),
            min_feed_age: Duration::from_secs(300),
            fetch_timeout: Duration::from_secs(30),
            worker_timeout: Duration::from_secs(45),
        }
    }
}

/// What one scraping round did, for logs and tests.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RoundSummary {
    /// Feeds selected for this round (≤ concurrency)
    pub selected: usize,
    /// Workers that completed a refresh
    pub succeeded: usize,
    /// Workers that failed or timed out
    pub failed: usize,
}

/// The periodic scraping engine.
///
/// Owns the storage handle and HTTP client; each round selects due feeds,
/// fans out one worker per feed bounded at `concurrency`, and waits for the
/// whole batch before the next tick. Rounds never overlap.
pub struct Scraper {
    db: Database,
    client: reqwest::Client,
    config: ScraperConfig,
}

impl Scraper {
    pub fn new(db: Database, client: reqwest::Client, config: ScraperConfig) -> Self {
        if config.worker_timeout >= config.interval {
            tracing::warn!(
                worker_timeout = ?config.worker_timeout,
                interval = ?config.interval,
                "worker_timeout is not below the round interval; a slow feed can delay ticks"
            );
        }
        Self { db, client, config }
    }

    /// Perform one selection-and-fan-out cycle.
    ///
    /// Public so operators (`--once`) and tests can drive rounds
    /// deterministically instead of waiting on the timer.
    ///
    /// A selection failure skips the round entirely — nothing is marked,
    /// nothing is fetched, and the next tick retries naturally. Worker
    /// failures are isolated per feed and reported in the summary; each
    /// worker is cut off at `worker_timeout` so the join-all barrier always
    /// completes.
    pub async fn run_round(&self) -> RoundSummary {
        let feeds = match self
            .db
            .select_due_feeds(self.config.concurrency as i64, self.config.min_feed_age)
            .await
        {
            Ok(feeds) => feeds,
            Err(e) => {
                tracing::error!(error = %e, "Feed selection failed, skipping round");
                return RoundSummary::default();
            }
        };

        if feeds.is_empty() {
            tracing::debug!("No feeds due for refresh");
            return RoundSummary::default();
        }

        let selected = feeds.len();
        tracing::info!(feeds = selected, "Scraping round started");

        let results: Vec<bool> = stream::iter(feeds)
            .map(|feed| {
                let db = self.db.clone();
                let client = self.client.clone();
                let fetch_timeout = self.config.fetch_timeout;
                let worker_timeout = self.config.worker_timeout;

                async move {
                    match tokio::time::timeout(
                        worker_timeout,
                        refresh_feed(&db, &client, &feed, fetch_timeout),
                    )
                    .await
                    {
                        Ok(Ok(outcome)) => {
                            tracing::info!(
                                feed = %outcome.feed_name,
                                items = outcome.items_seen,
                                created = outcome.posts_created,
                                skipped = outcome.items_skipped,
                                "Feed collected"
                            );
                            true
                        }
                        Ok(Err(e)) => {
                            tracing::warn!(feed = %feed.url, error = %e, "Feed refresh failed");
                            false
                        }
                        Err(_) => {
                            tracing::warn!(
                                feed = %feed.url,
                                timeout = ?worker_timeout,
                                "Feed refresh timed out"
                            );
                            false
                        }
                    }
                }
            })
            .buffer_unordered(self.config.concurrency)
            .collect()
            .await;

        let succeeded = results.iter().filter(|ok| **ok).count();
        let summary = RoundSummary {
            selected,
            succeeded,
            failed: selected - succeeded,
        };
        tracing::info!(
            selected = summary.selected,
            succeeded = summary.succeeded,
            failed = summary.failed,
            "Scraping round finished"
        );
        summary
    }

    /// Run rounds until `shutdown` flips to `true` (or its sender drops).
    ///
    /// The loop suspends in exactly two places: the join-all barrier inside
    /// [`run_round`](Self::run_round) and the inter-round sleep. Shutdown is
    /// observed during the sleep; an in-flight round finishes first, which
    /// keeps storage consistent without cancellation plumbing in the workers.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        tracing::info!(
            concurrency = self.config.concurrency,
            interval = ?self.config.interval,
            "Scraper started"
        );

        loop {
            self.run_round().await;

            tokio::select! {
                _ = tokio::time::sleep(self.config.interval) => {}
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        tracing::info!("Scraper stopped");
    }

    /// Start the scraping loop as an owned background task.
    pub fn spawn(self) -> ScraperHandle {
        let (tx, rx) = watch::channel(false);
        let task = tokio::spawn(async move { self.run(rx).await });
        ScraperHandle { task, shutdown: tx }
    }
}

/// Owned handle to a running scraper: explicit start/stop lifecycle instead
/// of a fire-and-forget background task.
pub struct ScraperHandle {
    task: JoinHandle<()>,
    shutdown: watch::Sender<bool>,
}

impl ScraperHandle {
    /// Signal shutdown and wait for the loop to exit. The current round, if
    /// any, completes first.
    pub async fn stop(self) {
        let _ = self.shutdown.send(true);
        if let Err(e) = self.task.await {
            tracing::warn!(error = %e, "Scraper task did not shut down cleanly");
        }
    }
}
