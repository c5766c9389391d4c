// src/runner.rs
//! One unit of work per trigger: fetch, parse, select new deals, filter, deliver,
//! advance the persisted cursor.

use std::collections::HashSet;
use std::sync::Arc;

use metrics::{counter, gauge};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::config::app::{AppConfig, DEFAULT_COMMAND_LIMIT, DEFAULT_SUMMARY_LIMIT};
use crate::ingest::parser::FeedParser;
use crate::ingest::types::{DealRecord, FeedFetcher};
use crate::notify::{Notifier, SummaryLabel};
use crate::novelty::{load_state, save_state, NoveltyState, NoveltyTracker, Selection};
use crate::store::KvStore;

#[derive(Debug, thiserror::Error)]
pub enum RunError {
    /// A required setting is missing; nothing was fetched or stored.
    #[error("Missing {0}")]
    Config(&'static str),
    /// Feed unreachable or non-2xx; state untouched, the next trigger retries.
    #[error("{0:#}")]
    Fetch(anyhow::Error),
    #[error("state store failed: {0:#}")]
    Store(anyhow::Error),
    /// Some sends failed. The cursor was still advanced.
    #[error("Delivered {sent} of {attempted} items; last error: {last_error}")]
    Delivery {
        attempted: usize,
        sent: usize,
        last_error: String,
    },
    /// A summary message was rejected. Earlier messages may have gone out.
    #[error("Summary delivery failed: {0:#}")]
    Summary(anyhow::Error),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    EmptyFeed,
    Bootstrapped,
    NothingNew,
    Sent(usize),
    NothingAfterFilters,
    SummarySent(usize),
}

impl RunOutcome {
    pub fn message(&self) -> String {
        match self {
            RunOutcome::EmptyFeed => "No items in feed".to_string(),
            RunOutcome::Bootstrapped => "First run: stored latest guid, no send".to_string(),
            RunOutcome::NothingNew => "No new items".to_string(),
            RunOutcome::Sent(n) => format!("Sent {n} new items"),
            RunOutcome::NothingAfterFilters => "No items after filters".to_string(),
            RunOutcome::SummarySent(n) => format!("Summary sent ({n} items)"),
        }
    }
}

/// Result status handed back to every caller (HTTP, scheduler logs).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunReport {
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<&Result<RunOutcome, RunError>> for RunReport {
    fn from(res: &Result<RunOutcome, RunError>) -> Self {
        match res {
            Ok(outcome) => RunReport {
                ok: true,
                message: Some(outcome.message()),
                error: None,
            },
            Err(e) => RunReport {
                ok: false,
                message: None,
                error: Some(e.to_string()),
            },
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunOptions {
    /// Announce the whole snapshot regardless of novelty.
    pub force: bool,
    /// Cap on deliveries after filtering.
    pub limit: Option<usize>,
}

pub struct Pipeline {
    config: Arc<AppConfig>,
    fetcher: Arc<dyn FeedFetcher>,
    store: Arc<dyn KvStore>,
    notifier: Arc<dyn Notifier>,
    parser: FeedParser,
    // Poll runs read-modify-write the novelty state; one at a time per process.
    run_lock: Mutex<()>,
}

impl Pipeline {
    pub fn new(
        config: Arc<AppConfig>,
        fetcher: Arc<dyn FeedFetcher>,
        store: Arc<dyn KvStore>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            config,
            fetcher,
            store,
            notifier,
            parser: FeedParser::new(),
            run_lock: Mutex::new(()),
        }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    fn require_webhook(&self) -> Result<(), RunError> {
        match self.config.discord_webhook_url.as_deref() {
            Some(url) if !url.is_empty() => Ok(()),
            _ => Err(RunError::Config("DISCORD_WEBHOOK_URL")),
        }
    }

    async fn snapshot(&self) -> Result<Vec<DealRecord>, RunError> {
        let doc = self.fetcher.fetch().await.map_err(|e| {
            tracing::warn!(target: "runner", fetcher = self.fetcher.name(), "feed fetch failed: {e:#}");
            RunError::Fetch(e)
        })?;
        Ok(self.parser.parse(&doc))
    }

    async fn persist(&self, state: &NoveltyState) -> Result<(), RunError> {
        save_state(self.store.as_ref(), state)
            .await
            .map_err(RunError::Store)
    }

    /// Scheduled or manual poll: announce what is new since the last run.
    pub async fn run(&self, opts: RunOptions) -> Result<RunOutcome, RunError> {
        let _guard = self.run_lock.lock().await;
        counter!("deal_runs_total", "kind" => "poll").increment(1);

        self.require_webhook()?;
        let snapshot = self.snapshot().await?;
        if snapshot.is_empty() {
            return Ok(RunOutcome::EmptyFeed);
        }

        let tracker = NoveltyTracker::new(self.config.seen_limit, self.config.first_run_send);
        let state = load_state(self.store.as_ref())
            .await
            .map_err(RunError::Store)?;
        let next = tracker.advance(&snapshot, &state);

        let fresh = match tracker.select(&snapshot, &state, opts.force) {
            Selection::Bootstrap => {
                self.persist(&next).await?;
                tracing::info!(target: "runner", baseline = snapshot.len(), "first run, state stored");
                return Ok(RunOutcome::Bootstrapped);
            }
            Selection::Fresh(items) => items,
        };
        if fresh.is_empty() {
            self.persist(&next).await?;
            return Ok(RunOutcome::NothingNew);
        }

        let new_count = fresh.len();
        let batch = with_history(&snapshot, fresh, self.config.history_items);
        let mut outgoing = self.config.filters.apply(batch);
        if let Some(limit) = opts.limit.filter(|n| *n > 0) {
            outgoing.truncate(limit);
        }
        // oldest first
        outgoing.reverse();

        let (sent, last_error) = self.deliver(&outgoing).await;

        // Advance even after failed sends so a poison deal is not retried forever.
        self.persist(&next).await?;
        gauge!("deal_last_run_ts").set(chrono::Utc::now().timestamp() as f64);

        tracing::info!(
            target: "runner",
            new = new_count,
            outgoing = outgoing.len(),
            sent,
            force = opts.force,
            "poll run finished"
        );

        match last_error {
            Some(last_error) => Err(RunError::Delivery {
                attempted: outgoing.len(),
                sent,
                last_error,
            }),
            None => Ok(RunOutcome::Sent(sent)),
        }
    }

    async fn deliver(&self, deals: &[DealRecord]) -> (usize, Option<String>) {
        let mut sent = 0usize;
        let mut last_error = None;
        for deal in deals {
            match self.notifier.send_deal(deal).await {
                Ok(()) => {
                    sent += 1;
                    counter!("deal_items_sent_total").increment(1);
                }
                Err(e) => {
                    tracing::warn!(target: "runner", guid = %deal.guid, "delivery failed: {e:#}");
                    counter!("deal_delivery_errors_total").increment(1);
                    last_error = Some(format!("{e:#}"));
                }
            }
        }
        (sent, last_error)
    }

    /// Top of the filtered feed, independent of novelty.
    pub async fn run_summary(
        &self,
        label: SummaryLabel,
        limit: Option<usize>,
    ) -> Result<RunOutcome, RunError> {
        counter!("deal_runs_total", "kind" => "summary").increment(1);
        self.require_webhook()?;

        let snapshot = self.snapshot().await?;
        if snapshot.is_empty() {
            return Ok(RunOutcome::EmptyFeed);
        }

        let limit = limit
            .filter(|n| *n > 0)
            .unwrap_or_else(|| self.config.summary_limit_or(DEFAULT_SUMMARY_LIMIT));
        let mut top = self.config.filters.apply(snapshot);
        top.truncate(limit);
        if top.is_empty() {
            return Ok(RunOutcome::NothingAfterFilters);
        }

        self.notifier.send_summary(&top, label).await.map_err(|e| {
            counter!("deal_delivery_errors_total").increment(1);
            RunError::Summary(e)
        })?;
        Ok(RunOutcome::SummarySent(top.len()))
    }

    /// Deals for the interactive command, oldest first.
    pub async fn command_deals(&self) -> Result<Vec<DealRecord>, RunError> {
        let snapshot = self.snapshot().await?;
        let mut top = self.config.filters.apply(snapshot);
        top.truncate(self.config.summary_limit_or(DEFAULT_COMMAND_LIMIT));
        top.reverse();
        Ok(top)
    }
}

/// New records followed by up to `extra` older snapshot records that are not new.
pub fn with_history(snapshot: &[DealRecord], fresh: Vec<DealRecord>, extra: usize) -> Vec<DealRecord> {
    if extra == 0 {
        return fresh;
    }
    let fresh_ids: HashSet<&str> = fresh.iter().map(|r| r.guid.as_str()).collect();
    let history: Vec<DealRecord> = snapshot
        .iter()
        .filter(|r| !fresh_ids.contains(r.guid.as_str()))
        .take(extra)
        .cloned()
        .collect();
    let mut batch = fresh;
    batch.extend(history);
    batch
}
