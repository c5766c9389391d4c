// src/ingest/mod.rs
pub mod parser;
pub mod pricing;
pub mod providers;
pub mod scanner;
pub mod scheduler;
pub mod types;

use once_cell::sync::Lazy;
use regex::{Captures, Regex};

pub use parser::{parse_feed, FeedParser};
pub use types::{DealRecord, FeedFetcher, Pricing, VendorMeta};

static RE_CDATA: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)<!\[CDATA\[(.*?)\]\]>").expect("cdata regex"));
static RE_ENTITY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"&(amp|lt|gt|quot|#39);").expect("entity regex"));
static RE_TAGS: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)<[^>]*>").expect("tag regex"));
static RE_WS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("ws regex"));

/// Replace every `<![CDATA[...]]>` section with its content.
pub fn strip_cdata(s: &str) -> String {
    RE_CDATA.replace_all(s, "$1").into_owned()
}

/// Decode the standard XML entities in one pass (no double decoding).
/// Anything else, e.g. `&nbsp;`, is left as-is.
pub fn decode_entities(s: &str) -> String {
    RE_ENTITY
        .replace_all(s, |caps: &Captures| match &caps[1] {
            "amp" => "&",
            "lt" => "<",
            "gt" => ">",
            "quot" => "\"",
            _ => "'", // #39
        })
        .into_owned()
}

/// Drop markup, collapse whitespace, trim.
pub fn strip_html(html: &str) -> String {
    let no_tags = RE_TAGS.replace_all(html, " ");
    RE_WS.replace_all(&no_tags, " ").trim().to_string()
}
