// src/ingest/scanner.rs
//! Tolerant structural scanning: split a feed document into raw entry blocks
//! without requiring well-formed XML (stray `&`, unclosed HTML in CDATA, ...).

use once_cell::sync::Lazy;
use regex::Regex;

/// Raw markup of one entry, borrowed from the source document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawEntry<'a> {
    pub body: &'a str,
}

/// Splits a document into entry blocks in document order.
/// Swap the implementation to support another markup dialect.
pub trait EntryScanner: Send + Sync {
    fn scan<'a>(&self, document: &'a str) -> Vec<RawEntry<'a>>;
}

/// RSS 2.0 `<item>...</item>` scanner.
#[derive(Debug, Clone, Copy, Default)]
pub struct ItemScanner;

static RE_ITEM: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?is)<item(?:\s[^>]*)?>(.*?)</item\s*>").expect("item regex")
});

impl EntryScanner for ItemScanner {
    fn scan<'a>(&self, document: &'a str) -> Vec<RawEntry<'a>> {
        RE_ITEM
            .captures_iter(document)
            .filter_map(|caps| caps.get(1))
            .map(|m| RawEntry { body: m.as_str() })
            .collect()
    }
}
