// src/lib.rs
// Public library surface for the binaries and integration tests.

pub mod api;
pub mod config;
pub mod filter;
pub mod ingest;
pub mod metrics;
pub mod notify;
pub mod novelty;
pub mod runner;
pub mod store;

use std::sync::Arc;

use axum::Router;

pub use crate::api::{create_router, AppState};
pub use crate::config::AppConfig;
pub use crate::ingest::{DealRecord, FeedParser, Pricing, VendorMeta};
pub use crate::runner::{Pipeline, RunError, RunOptions, RunOutcome, RunReport};

use crate::ingest::providers::HttpFeed;
use crate::notify::DiscordNotifier;
use crate::store::FileStore;

/// Wire the production components: HTTP feed, file-backed state, Discord webhook.
pub fn build_pipeline(config: Arc<AppConfig>) -> Arc<Pipeline> {
    let fetcher = HttpFeed::new(config.feed_url.clone(), config.user_agent.clone());
    let store = FileStore::new(config.state_path.clone());
    // Runs refuse to start without a webhook, so an empty one is never posted to.
    let notifier = DiscordNotifier::new(config.discord_webhook_url.clone().unwrap_or_default())
        .with_mention(config.discord_user_id.clone());

    Arc::new(Pipeline::new(
        config,
        Arc::new(fetcher),
        Arc::new(store),
        Arc::new(notifier),
    ))
}

/// Full HTTP surface: service routes plus `/metrics`.
pub fn app(pipeline: Arc<Pipeline>) -> anyhow::Result<Router> {
    let metrics = metrics::Metrics::init()?;
    Ok(create_router(AppState { pipeline }).merge(metrics.router()))
}
