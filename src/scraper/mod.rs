//! The periodic scraping engine.
//!
//! [`scheduler`] owns the long-running loop: on a fixed cadence it selects
//! due feeds, fans one [`worker`] out per feed bounded at the configured
//! concurrency, and joins the whole batch before the next tick. All failure
//! handling follows one rule — contain errors at the smallest scope (item >
//! feed > round) and never let them abort a larger one.

mod scheduler;
mod worker;

pub use scheduler::{RoundSummary, Scraper, ScraperConfig, ScraperHandle};
pub use worker::{refresh_feed, RefreshError, RefreshOutcome};
