// src/ingest/parser.rs
//! Per-entry field extraction. Works on the raw blocks produced by an
//! [`EntryScanner`]; never fails, entries without title/link/guid are dropped.

use std::collections::HashMap;

use metrics::{counter, histogram};
use once_cell::sync::Lazy;
use quick_xml::events::BytesStart;
use regex::Regex;

use crate::ingest::scanner::{EntryScanner, ItemScanner, RawEntry};
use crate::ingest::types::{DealRecord, VendorMeta};
use crate::ingest::{decode_entities, pricing, strip_cdata, strip_html};

/// Vendor metadata element carried by the default feed.
pub const VENDOR_META_TAG: &str = "ozb:meta";

fn element_pattern(tag: &str) -> Regex {
    let tag = regex::escape(tag);
    Regex::new(&format!(r"(?is)<{tag}(?:\s[^>]*)?>(.*?)</{tag}\s*>")).expect("element regex")
}

fn start_tag_pattern(tag: &str) -> Regex {
    Regex::new(&format!(r"(?is)<{}\b[^>]*>", regex::escape(tag))).expect("start tag regex")
}

struct Patterns {
    title: Regex,
    link: Regex,
    guid: Regex,
    pub_date: Regex,
    description: Regex,
    category: Regex,
    media_thumbnail: Regex,
    media_content: Regex,
    vendor_meta: Regex,
    img_src: Regex,
}

static PATTERNS: Lazy<Patterns> = Lazy::new(|| Patterns {
    title: element_pattern("title"),
    link: element_pattern("link"),
    guid: element_pattern("guid"),
    pub_date: element_pattern("pubDate"),
    description: element_pattern("description"),
    category: element_pattern("category"),
    media_thumbnail: start_tag_pattern("media:thumbnail"),
    media_content: start_tag_pattern("media:content"),
    vendor_meta: start_tag_pattern(VENDOR_META_TAG),
    img_src: Regex::new(r#"(?is)<img\b[^>]*?\ssrc\s*=\s*["']([^"'>]+)["']"#).expect("img regex"),
});

/// Parses whole documents into [`DealRecord`]s using a pluggable scanner.
#[derive(Debug, Clone, Default)]
pub struct FeedParser<S = ItemScanner> {
    scanner: S,
}

impl FeedParser<ItemScanner> {
    pub fn new() -> Self {
        Self::default()
    }
}

impl<S: EntryScanner> FeedParser<S> {
    pub fn with_scanner(scanner: S) -> Self {
        Self { scanner }
    }

    /// Records in document order. Malformed entries are skipped.
    pub fn parse(&self, document: &str) -> Vec<DealRecord> {
        let t0 = std::time::Instant::now();
        let entries = self.scanner.scan(document);
        let total = entries.len();

        let records: Vec<DealRecord> = entries.iter().filter_map(parse_entry).collect();

        let skipped = total - records.len();
        if skipped > 0 {
            tracing::debug!(target: "ingest", skipped, total, "dropped incomplete entries");
            counter!("deal_records_skipped_total").increment(skipped as u64);
        }
        histogram!("deal_parse_ms").record(t0.elapsed().as_secs_f64() * 1_000.0);
        counter!("deal_records_parsed_total").increment(records.len() as u64);
        records
    }
}

/// Convenience wrapper over the RSS item scanner.
pub fn parse_feed(document: &str) -> Vec<DealRecord> {
    FeedParser::new().parse(document)
}

/// Build a record from one entry block; `None` when title, link or guid is empty.
pub fn parse_entry(entry: &RawEntry<'_>) -> Option<DealRecord> {
    let xml = entry.body;
    let p = &*PATTERNS;

    let title = tag_text(xml, &p.title);
    let link = tag_text(xml, &p.link);
    let mut guid = tag_text(xml, &p.guid);
    if guid.is_empty() {
        guid = link.clone();
    }
    if title.is_empty() || link.is_empty() || guid.is_empty() {
        return None;
    }

    let raw_description = tag_text(xml, &p.description);
    let description = strip_html(&raw_description);
    let vendor_meta = vendor_meta(xml);

    let image = start_tag_attr(xml, &p.media_thumbnail, "url")
        .or_else(|| start_tag_attr(xml, &p.media_content, "url"))
        .or_else(|| first_image(&raw_description))
        .or_else(|| vendor_meta.as_ref().and_then(|m| m.image.clone()));

    let pricing = pricing::extract(&format!("{title} {description}"));

    Some(DealRecord {
        categories: all_tag_text(xml, &p.category),
        published_at: tag_text(xml, &p.pub_date),
        title,
        link,
        guid,
        description,
        image,
        vendor_meta,
        pricing,
    })
}

/// First match, CDATA unwrapped, entities decoded, trimmed.
fn tag_text(xml: &str, re: &Regex) -> String {
    re.captures(xml)
        .and_then(|caps| caps.get(1))
        .map(|m| clean_text(m.as_str()))
        .unwrap_or_default()
}

fn all_tag_text(xml: &str, re: &Regex) -> Vec<String> {
    re.captures_iter(xml)
        .filter_map(|caps| caps.get(1))
        .map(|m| clean_text(m.as_str()))
        .filter(|s| !s.is_empty())
        .collect()
}

fn clean_text(raw: &str) -> String {
    decode_entities(strip_cdata(raw).trim()).trim().to_string()
}

fn first_image(html: &str) -> Option<String> {
    PATTERNS
        .img_src
        .captures(html)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim().to_string())
        .filter(|s| !s.is_empty())
}

fn start_tag_attr(xml: &str, re: &Regex, attr: &str) -> Option<String> {
    let tag = re.find(xml)?;
    start_tag_attributes(tag.as_str())
        .remove(attr)
        .filter(|v| !v.is_empty())
}

/// Attributes of a raw start tag such as `<ozb:meta url="..." votes-pos="3"/>`.
/// Keys are lowercased; values get the five XML entities decoded. Broken
/// attributes are skipped rather than rejected.
pub fn start_tag_attributes(tag: &str) -> HashMap<String, String> {
    let inner = tag
        .trim()
        .trim_start_matches('<')
        .trim_end_matches('>')
        .trim_end_matches('/')
        .trim();
    let name_len = inner
        .find(|c: char| c.is_whitespace())
        .unwrap_or(inner.len());

    let start = BytesStart::from_content(inner, name_len);
    let mut attrs = start.attributes();
    attrs.with_checks(false);

    attrs
        .flatten()
        .map(|a| {
            let key = String::from_utf8_lossy(a.key.as_ref()).to_ascii_lowercase();
            let value = decode_entities(&String::from_utf8_lossy(&a.value));
            (key, value)
        })
        .collect()
}

fn vendor_meta(xml: &str) -> Option<VendorMeta> {
    let tag = PATTERNS.vendor_meta.find(xml)?;
    let mut attrs = start_tag_attributes(tag.as_str());
    let mut text = |key: &str| attrs.remove(key).filter(|v| !v.is_empty());

    let url = text("url");
    let image = text("image");
    let votes_pos = text("votes-pos");
    let votes_neg = text("votes-neg");
    let comment_count = text("comment-count");
    let click_count = text("click-count");
    let expiry = text("expiry");
    let starting = text("starting");

    Some(VendorMeta {
        url,
        image,
        votes_pos: votes_pos.as_deref().and_then(parse_count),
        votes_neg: votes_neg.as_deref().and_then(parse_count),
        comment_count: comment_count.as_deref().and_then(parse_count),
        click_count: click_count.as_deref().and_then(parse_count),
        expiry,
        starting,
    })
}

/// Non-numeric counts are absent, not errors.
fn parse_count(s: &str) -> Option<u64> {
    s.trim().parse().ok()
}
