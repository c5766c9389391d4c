use anyhow::{anyhow, Result};
use axum::{routing::get, Router};
use metrics::{describe_counter, describe_gauge, describe_histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;

// The global recorder can be installed once per process.
static HANDLE: OnceCell<PrometheusHandle> = OnceCell::new();

#[derive(Clone)]
pub struct Metrics {
    pub handle: PrometheusHandle,
}

impl Metrics {
    /// Install the Prometheus recorder (first call only) and describe the series.
    pub fn init() -> Result<Self> {
        let handle = HANDLE
            .get_or_try_init(|| {
                PrometheusBuilder::new()
                    .install_recorder()
                    .map_err(|e| anyhow!("prometheus: install recorder: {e}"))
            })?
            .clone();

        describe_counter!("deal_runs_total", "Poll and summary runs started, by kind");
        describe_counter!("deal_records_parsed_total", "Feed entries parsed into deal records");
        describe_counter!("deal_records_skipped_total", "Feed entries dropped for missing fields");
        describe_counter!("deal_items_sent_total", "New deals delivered to Discord");
        describe_counter!("deal_delivery_errors_total", "Failed Discord deliveries");
        describe_counter!("deal_feed_errors_total", "Failed feed fetches");
        describe_histogram!("deal_parse_ms", "Time spent parsing one feed document");
        describe_gauge!("deal_last_run_ts", "Unix time of the last completed poll run");

        Ok(Self { handle })
    }

    /// Returns a router exposing `/metrics` with the Prometheus exposition format.
    pub fn router(&self) -> Router {
        let handle = self.handle.clone();
        Router::new().route(
            "/metrics",
            get(move || {
                let h = handle.clone();
                async move { h.render() }
            }),
        )
    }
}
