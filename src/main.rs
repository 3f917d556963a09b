use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;

use gleaner::config::Config;
use gleaner::scraper::Scraper;
use gleaner::storage::Database;

#[derive(Parser, Debug)]
#[command(name = "gleaner", about = "Scheduled RSS/Atom feed aggregator")]
struct Args {
    /// Path to the configuration file
    #[arg(long, value_name = "FILE", default_value = "gleaner.toml")]
    config: PathBuf,

    /// Override the database path from the config file
    #[arg(long, value_name = "PATH")]
    db: Option<String>,

    /// Register a feed URL, then continue startup
    #[arg(long, value_name = "URL")]
    add: Option<String>,

    /// Display name for --add (defaults to the URL's host)
    #[arg(long, value_name = "NAME", requires = "add")]
    name: Option<String>,

    /// Run a single scraping round and exit
    #[arg(long)]
    once: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();

    let mut config = Config::load(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;
    if let Some(db_path) = args.db {
        config.database_path = db_path;
    }

    let db = Database::open(&config.database_path)
        .await
        .with_context(|| format!("Failed to open database at {}", config.database_path))?;

    if let Some(feed_url) = &args.add {
        let parsed = url::Url::parse(feed_url)
            .with_context(|| format!("Invalid feed URL: {}", feed_url))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            anyhow::bail!("Feed URL must be http or https: {}", feed_url);
        }

        let name = args
            .name
            .clone()
            .or_else(|| parsed.host_str().map(str::to_string))
            .unwrap_or_else(|| feed_url.clone());
        let feed = db.add_feed(&name, feed_url).await?;
        println!("Registered feed {} ({})", feed.name, feed.url);
    }

    let feeds = db.list_feeds().await?;
    if feeds.is_empty() {
        eprintln!("No feeds registered. Add one with: gleaner --add <URL>");
    } else {
        tracing::info!(feeds = feeds.len(), "Feeds registered");
    }

    let client = reqwest::Client::new();
    let scraper = Scraper::new(db, client, config.scraper());

    if args.once {
        let summary = scraper.run_round().await;
        println!(
            "Round finished: {} selected, {} succeeded, {} failed",
            summary.selected, summary.succeeded, summary.failed
        );
        return Ok(());
    }

    let handle = scraper.spawn();
    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for shutdown signal")?;
    tracing::info!("Shutdown signal received");
    handle.stop().await;

    Ok(())
}
