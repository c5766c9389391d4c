// src/config/app.rs
//! Immutable service configuration, built once from the environment and
//! passed explicitly to every component.

use std::path::PathBuf;

use anyhow::Result;

use crate::config::filters::{self, KeywordLists};
use crate::filter::{parse_keyword_csv, FilterCriteria};
use crate::novelty::DEFAULT_SEEN_CAP;

pub const DEFAULT_FEED_URL: &str = "https://www.ozbargain.com.au/feed";
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0 Safari/537.36";
pub const DEFAULT_COMMAND_NAME: &str = "ozb";
pub const DEFAULT_DISCORD_API_BASE: &str = "https://discord.com/api/v10";
pub const DEFAULT_STATE_PATH: &str = "state/novelty.json";
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 300;
pub const DEFAULT_SUMMARY_CRON: &str = "0 14,17,20,23,2,5,8,11 * * *";
/// Summary size when neither the request nor `SUMMARY_LIMIT` gives one.
pub const DEFAULT_SUMMARY_LIMIT: usize = 10;
/// Size of the interactive command's list.
pub const DEFAULT_COMMAND_LIMIT: usize = 15;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub discord_webhook_url: Option<String>,
    pub discord_user_id: Option<String>,
    pub discord_public_key: Option<String>,
    pub discord_command_name: String,
    pub discord_api_base: String,
    pub feed_url: String,
    pub user_agent: String,
    pub filters: FilterCriteria,
    pub seen_limit: usize,
    pub summary_limit: Option<usize>,
    pub first_run_send: bool,
    pub history_items: usize,
    pub state_path: PathBuf,
    pub poll_interval_secs: u64,
    pub summary_cron: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            discord_webhook_url: None,
            discord_user_id: None,
            discord_public_key: None,
            discord_command_name: DEFAULT_COMMAND_NAME.to_string(),
            discord_api_base: DEFAULT_DISCORD_API_BASE.to_string(),
            feed_url: DEFAULT_FEED_URL.to_string(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            filters: FilterCriteria::default(),
            seen_limit: DEFAULT_SEEN_CAP,
            summary_limit: None,
            first_run_send: false,
            history_items: 0,
            state_path: PathBuf::from(DEFAULT_STATE_PATH),
            poll_interval_secs: DEFAULT_POLL_INTERVAL_SECS,
            summary_cron: Some(DEFAULT_SUMMARY_CRON.to_string()),
        }
    }
}

impl AppConfig {
    /// Read the process environment. Also merges `DEAL_FILTERS_PATH`, if set.
    pub fn from_env() -> Result<Self> {
        let mut cfg = Self::from_lookup(|key| std::env::var(key).ok());
        if let Some(extra) = filters::load_keyword_file_from_env()? {
            cfg.merge_keywords(extra);
        }
        Ok(cfg)
    }

    /// Build from an arbitrary lookup; unparsable numbers fall back to defaults.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let text = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let number = |key: &str| text(key).and_then(|v| v.parse::<f64>().ok()).filter(|v| v.is_finite());
        let count = |key: &str| text(key).and_then(|v| v.parse::<usize>().ok());
        let defaults = Self::default();

        let filters = FilterCriteria::new(
            text("KEYWORDS_INCLUDE")
                .map(|v| parse_keyword_csv(&v))
                .unwrap_or_default(),
            text("KEYWORDS_EXCLUDE")
                .map(|v| parse_keyword_csv(&v))
                .unwrap_or_default(),
        )
        .with_min_discount(number("MIN_DISCOUNT"))
        .with_max_price(number("MAX_PRICE"));

        Self {
            discord_webhook_url: text("DISCORD_WEBHOOK_URL"),
            discord_user_id: text("DISCORD_USER_ID"),
            discord_public_key: text("DISCORD_PUBLIC_KEY"),
            discord_command_name: text("DISCORD_COMMAND_NAME")
                .unwrap_or(defaults.discord_command_name),
            discord_api_base: text("DISCORD_API_BASE")
                .map(|v| v.trim_end_matches('/').to_string())
                .unwrap_or(defaults.discord_api_base),
            feed_url: text("RSS_URL").unwrap_or(defaults.feed_url),
            user_agent: text("RSS_USER_AGENT").unwrap_or(defaults.user_agent),
            filters,
            seen_limit: count("SEEN_GUIDS_LIMIT")
                .filter(|n| *n > 0)
                .unwrap_or(defaults.seen_limit),
            summary_limit: count("SUMMARY_LIMIT").filter(|n| *n > 0),
            first_run_send: text("FIRST_RUN_SEND")
                .is_some_and(|v| v.eq_ignore_ascii_case("true")),
            history_items: count("HISTORY_ITEMS").unwrap_or(defaults.history_items),
            state_path: text("STATE_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.state_path),
            poll_interval_secs: text("POLL_INTERVAL_SECS")
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.poll_interval_secs),
            summary_cron: match lookup("SUMMARY_CRON") {
                // explicitly blank disables the summary schedule
                Some(v) if v.trim().is_empty() => None,
                Some(v) => Some(v.trim().to_string()),
                None => defaults.summary_cron,
            },
        }
    }

    /// Append keyword lists from a file to the env-provided ones.
    pub fn merge_keywords(&mut self, extra: KeywordLists) {
        for kw in extra.include {
            let kw = kw.to_lowercase();
            if !self.filters.include.contains(&kw) {
                self.filters.include.push(kw);
            }
        }
        for kw in extra.exclude {
            let kw = kw.to_lowercase();
            if !self.filters.exclude.contains(&kw) {
                self.filters.exclude.push(kw);
            }
        }
    }

    pub fn summary_limit_or(&self, fallback: usize) -> usize {
        self.summary_limit.unwrap_or(fallback)
    }
}
