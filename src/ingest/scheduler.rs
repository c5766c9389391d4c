// src/ingest/scheduler.rs
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Result};
use chrono::Utc;
use croner::Cron;
use tokio::task::JoinHandle;

use crate::notify::SummaryLabel;
use crate::runner::{Pipeline, RunOptions, RunReport};

/// Poll the feed every `interval_secs`. The first tick fires immediately.
pub fn spawn_poll_scheduler(pipeline: Arc<Pipeline>, interval_secs: u64) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_secs(interval_secs.max(1)));
        // A slow run delays the next tick instead of queueing a burst.
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            let res = pipeline.run(RunOptions::default()).await;
            let report = RunReport::from(&res);
            if report.ok {
                tracing::info!(target: "ingest", result = report.message.as_deref().unwrap_or_default(), "poll tick");
            } else {
                tracing::warn!(target: "ingest", error = report.error.as_deref().unwrap_or_default(), "poll tick failed");
            }
        }
    })
}

pub fn parse_schedule(expr: &str) -> Result<Cron> {
    Cron::new(expr)
        .parse()
        .map_err(|e| anyhow!("invalid cron expression '{}': {}", expr, e))
}

/// Send a summary at every occurrence of `expr` (UTC).
pub fn spawn_summary_scheduler(pipeline: Arc<Pipeline>, expr: &str) -> Result<JoinHandle<()>> {
    let cron = parse_schedule(expr)?;
    let expr = expr.to_string();

    Ok(tokio::spawn(async move {
        tracing::info!(target: "ingest", schedule = %expr, "summary scheduler started");
        loop {
            let now = Utc::now();
            let next = match cron.find_next_occurrence(&now, false) {
                Ok(next) => next,
                Err(e) => {
                    tracing::error!(target: "ingest", error = %e, "no next summary occurrence, stopping");
                    return;
                }
            };
            let wait = (next - now).to_std().unwrap_or_default();
            tokio::time::sleep(wait).await;

            let res = pipeline.run_summary(SummaryLabel::Scheduled, None).await;
            let report = RunReport::from(&res);
            if report.ok {
                tracing::info!(target: "ingest", result = report.message.as_deref().unwrap_or_default(), "summary tick");
            } else {
                tracing::warn!(target: "ingest", error = report.error.as_deref().unwrap_or_default(), "summary tick failed");
            }
        }
    }))
}
