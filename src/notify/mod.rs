// src/notify/mod.rs
pub mod discord;
pub mod format;

use anyhow::Result;

use crate::ingest::types::DealRecord;

pub use discord::{DiscordNotifier, InteractionFollowUp};

/// Which summary heading to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SummaryLabel {
    Scheduled,
    Manual,
}

impl SummaryLabel {
    pub fn title(self) -> &'static str {
        match self {
            SummaryLabel::Scheduled => "Front Page Summary",
            SummaryLabel::Manual => "Front Page Summary (manual)",
        }
    }
}

/// Outbound delivery of deals. One call is one delivery attempt as far as the
/// runner is concerned; transports may retry internally.
#[async_trait::async_trait]
pub trait Notifier: Send + Sync {
    async fn send_deal(&self, deal: &DealRecord) -> Result<()>;
    /// `deals` newest-first, as filtered from the feed.
    async fn send_summary(&self, deals: &[DealRecord], label: SummaryLabel) -> Result<()>;
}
