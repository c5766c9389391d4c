// src/ingest/providers/fixture.rs
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::path::Path;

use crate::ingest::types::FeedFetcher;

/// Serves a fixed document; used by tests and the `feed_probe` tool.
#[derive(Debug, Clone)]
pub struct FixtureFeed {
    content: String,
}

impl FixtureFeed {
    pub fn from_fixture(content: &str) -> Self {
        Self {
            content: content.to_string(),
        }
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading feed fixture {}", path.display()))?;
        Ok(Self { content })
    }
}

#[async_trait]
impl FeedFetcher for FixtureFeed {
    async fn fetch(&self) -> Result<String> {
        Ok(self.content.clone())
    }

    fn name(&self) -> &'static str {
        "fixture"
    }
}
