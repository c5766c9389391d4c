// src/ingest/types.rs
use anyhow::Result;
use serde::{Deserialize, Serialize};

/// Price signals pulled out of a deal's free text.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Pricing {
    pub deal_price: f64,
    pub original_price: Option<f64>,
    pub discount_percent: Option<u32>,
}

/// Vendor-specific attribute block (`<ozb:meta .../>` on the default feed).
/// Every field is independently optional.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct VendorMeta {
    pub url: Option<String>,
    pub image: Option<String>,
    pub votes_pos: Option<u64>,
    pub votes_neg: Option<u64>,
    pub comment_count: Option<u64>,
    pub click_count: Option<u64>,
    pub expiry: Option<String>,
    pub starting: Option<String>,
}

/// One feed entry after parsing. `title`, `link` and `guid` are never empty.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DealRecord {
    pub title: String,
    pub link: String,
    pub guid: String,
    pub published_at: String, // feed-native, e.g. RFC 2822; may be empty
    pub description: String,  // plain text
    pub image: Option<String>,
    pub categories: Vec<String>,
    pub vendor_meta: Option<VendorMeta>,
    pub pricing: Option<Pricing>,
}

impl DealRecord {
    /// Text used for keyword matching and price extraction.
    pub fn haystack(&self) -> String {
        format!("{} {}", self.title, self.description)
    }
}

/// Source of raw feed documents.
#[async_trait::async_trait]
pub trait FeedFetcher: Send + Sync {
    /// Returns the raw document; non-2xx responses are errors carrying the status.
    async fn fetch(&self) -> Result<String>;
    fn name(&self) -> &'static str;
}
