// src/ingest/providers/http_feed.rs
use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use metrics::counter;
use reqwest::header::{ACCEPT, USER_AGENT};
use reqwest::Client;

use crate::ingest::types::FeedFetcher;

const ACCEPT_FEED: &str = "application/rss+xml, application/xml;q=0.9, */*;q=0.8";

/// Fetches the live feed over HTTP. No retries: a failed fetch simply waits
/// for the next trigger.
#[derive(Clone)]
pub struct HttpFeed {
    url: String,
    user_agent: String,
    client: Client,
}

impl HttpFeed {
    pub fn new(url: impl Into<String>, user_agent: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            user_agent: user_agent.into(),
            client: Client::new(),
        }
    }
}

#[async_trait]
impl FeedFetcher for HttpFeed {
    async fn fetch(&self) -> Result<String> {
        let resp = match self
            .client
            .get(&self.url)
            .header(USER_AGENT, &self.user_agent)
            .header(ACCEPT, ACCEPT_FEED)
            .send()
            .await
        {
            Ok(resp) => resp,
            Err(e) => {
                tracing::warn!(target: "ingest", error = ?e, url = %self.url, "feed http error");
                counter!("deal_feed_errors_total").increment(1);
                return Err(e).context("RSS fetch failed");
            }
        };

        let status = resp.status();
        if !status.is_success() {
            counter!("deal_feed_errors_total").increment(1);
            bail!("RSS fetch failed: {}", status.as_u16());
        }
        resp.text().await.context("reading RSS body")
    }

    fn name(&self) -> &'static str {
        "http"
    }
}
