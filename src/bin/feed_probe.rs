//! Fetch a feed (URL or local file) and print the parsed deals as JSON lines.
//!
//! Usage: `feed_probe <path-or-url> [--filtered]`
//! With `--filtered`, the keyword/discount/price filters from the environment apply.

use std::path::Path;

use anyhow::{bail, Result};
use deal_feed_notifier::config::AppConfig;
use deal_feed_notifier::ingest::providers::{FixtureFeed, HttpFeed};
use deal_feed_notifier::ingest::{parse_feed, FeedFetcher};

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt()
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let mut args = std::env::args().skip(1);
    let Some(source) = args.next() else {
        bail!("usage: feed_probe <path-or-url> [--filtered]");
    };
    let filtered = args.any(|a| a == "--filtered");
    let config = AppConfig::from_env()?;

    let fetcher: Box<dyn FeedFetcher> = if source.starts_with("http://") || source.starts_with("https://") {
        Box::new(HttpFeed::new(source.clone(), config.user_agent.clone()))
    } else {
        Box::new(FixtureFeed::from_path(Path::new(&source))?)
    };

    let doc = fetcher.fetch().await?;
    let mut deals = parse_feed(&doc);
    let total = deals.len();
    if filtered {
        deals = config.filters.apply(deals);
    }

    for deal in &deals {
        println!("{}", serde_json::to_string(deal)?);
    }
    tracing::info!(source = fetcher.name(), total, shown = deals.len(), "probe finished");
    Ok(())
}
