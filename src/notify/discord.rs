use super::format::{self, WebhookMessage};
use super::{Notifier, SummaryLabel};
use crate::ingest::types::DealRecord;
use anyhow::{anyhow, Context, Result};
use reqwest::Client;
use std::time::Duration;

/// Posts to a Discord channel webhook.
#[derive(Clone)]
pub struct DiscordNotifier {
    webhook: String,
    user_id: Option<String>,
    client: Client,
    timeout: Duration,
    max_retries: u8,
}

impl DiscordNotifier {
    pub fn new(webhook: String) -> Self {
        Self {
            webhook,
            user_id: None,
            client: Client::new(),
            timeout: Duration::from_secs(5),
            max_retries: 3,
        }
    }

    /// Mention this user in pushes and summaries.
    pub fn with_mention(mut self, user_id: Option<String>) -> Self {
        self.user_id = user_id;
        self
    }

    /// Total attempts per message (at least one).
    pub fn with_retries(mut self, retries: u8) -> Self {
        self.max_retries = retries;
        self
    }

    pub async fn post(&self, payload: &WebhookMessage) -> Result<()> {
        let mut attempt: u8 = 0;
        loop {
            attempt += 1;
            let res = self
                .client
                .post(&self.webhook)
                .timeout(self.timeout)
                .json(payload)
                .send()
                .await;

            let err = match res {
                Ok(rsp) if rsp.status().is_success() => return Ok(()),
                Ok(rsp) => {
                    let status = rsp.status().as_u16();
                    let body = rsp.text().await.unwrap_or_default();
                    anyhow!("Discord webhook failed: {status} {}", body.trim())
                }
                Err(e) => anyhow!("Discord webhook request failed: {e}"),
            };

            if attempt < self.max_retries {
                tracing::debug!(target: "notify", attempt, "webhook send failed, retrying: {err:#}");
                tokio::time::sleep(backoff(attempt)).await;
                continue;
            }
            return Err(err);
        }
    }
}

#[async_trait::async_trait]
impl Notifier for DiscordNotifier {
    async fn send_deal(&self, deal: &DealRecord) -> Result<()> {
        let payload = format::new_deal_message(deal, self.user_id.as_deref());
        self.post(&payload).await
    }

    async fn send_summary(&self, deals: &[DealRecord], label: SummaryLabel) -> Result<()> {
        let messages = format::summary_messages(deals, self.user_id.as_deref(), label.title());
        let total = messages.len();
        for (i, msg) in messages.iter().enumerate() {
            self.post(msg)
                .await
                .with_context(|| format!("summary message {} of {total} ({i} delivered)", i + 1))?;
        }
        Ok(())
    }
}

/// Delay before retry `attempt + 1`: 500ms, doubling, capped at 32s.
fn backoff(attempt: u8) -> Duration {
    let exp = u32::from(attempt.saturating_sub(1)).min(6);
    Duration::from_millis(500u64 << exp)
}

/// Follow-up channel of a deferred interaction.
#[derive(Clone)]
pub struct InteractionFollowUp {
    url: String,
    client: Client,
}

impl InteractionFollowUp {
    pub fn new(api_base: &str, application_id: &str, token: &str) -> Self {
        Self {
            url: format!(
                "{}/webhooks/{application_id}/{token}",
                api_base.trim_end_matches('/')
            ),
            client: Client::new(),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub async fn send(&self, payload: &WebhookMessage) -> Result<()> {
        let rsp = self
            .client
            .post(&self.url)
            .json(payload)
            .send()
            .await
            .map_err(|e| anyhow!("Follow-up request failed: {e}"))?;
        let status = rsp.status();
        if !status.is_success() {
            let body = rsp.text().await.unwrap_or_default();
            return Err(anyhow!("Follow-up failed: {} {}", status.as_u16(), body.trim()));
        }
        Ok(())
    }
}
