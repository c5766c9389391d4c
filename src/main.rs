//! Deal feed notifier: binary entrypoint.
//! Boots the Axum server and the background poll / summary schedulers.

use std::sync::Arc;

use shuttle_axum::ShuttleAxum;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use deal_feed_notifier::ingest::scheduler::{spawn_poll_scheduler, spawn_summary_scheduler};
use deal_feed_notifier::{app, build_pipeline, AppConfig};

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("deal_feed_notifier=info,warn"));

    // The runtime may already have installed a subscriber.
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact())
        .try_init();
}

#[shuttle_runtime::main]
async fn axum() -> ShuttleAxum {
    // Load .env in local/dev; no-op in prod environments.
    let _ = dotenvy::dotenv();
    init_tracing();

    let config = Arc::new(AppConfig::from_env()?);
    let pipeline = build_pipeline(config.clone());

    if config.discord_webhook_url.is_none() {
        tracing::warn!("DISCORD_WEBHOOK_URL not set; scheduled runs disabled");
    } else {
        if config.poll_interval_secs > 0 {
            spawn_poll_scheduler(pipeline.clone(), config.poll_interval_secs);
            tracing::info!(
                interval_secs = config.poll_interval_secs,
                feed = %config.feed_url,
                "poll scheduler started"
            );
        }
        if let Some(expr) = config.summary_cron.as_deref() {
            spawn_summary_scheduler(pipeline.clone(), expr)?;
        }
    }

    let router = app(pipeline)?;
    Ok(router.into())
}
