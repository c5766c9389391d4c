// src/filter.rs
//! Keyword and threshold filtering. Every criterion only narrows the result.

use serde::{Deserialize, Serialize};

use crate::ingest::types::DealRecord;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FilterCriteria {
    /// Lowercased; when non-empty a record must contain at least one.
    pub include: Vec<String>,
    /// Lowercased; a record containing any of these is dropped.
    pub exclude: Vec<String>,
    pub min_discount: Option<f64>,
    pub max_price: Option<f64>,
}

impl FilterCriteria {
    pub fn new(include: Vec<String>, exclude: Vec<String>) -> Self {
        Self {
            include: lowercase_all(include),
            exclude: lowercase_all(exclude),
            min_discount: None,
            max_price: None,
        }
    }

    pub fn with_min_discount(mut self, min: Option<f64>) -> Self {
        self.min_discount = min;
        self
    }

    pub fn with_max_price(mut self, max: Option<f64>) -> Self {
        self.max_price = max;
        self
    }

    pub fn is_empty(&self) -> bool {
        self.include.is_empty()
            && self.exclude.is_empty()
            && self.min_discount.is_none()
            && self.max_price.is_none()
    }

    /// Plain substring matching over `title + " " + description`, case-insensitive.
    pub fn matches(&self, record: &DealRecord) -> bool {
        let haystack = record.haystack().to_lowercase();

        if !self.include.is_empty() && !contains_any(&haystack, &self.include) {
            return false;
        }
        if contains_any(&haystack, &self.exclude) {
            return false;
        }

        if let Some(min) = self.min_discount {
            let discount = record.pricing.and_then(|p| p.discount_percent);
            match discount {
                Some(d) if f64::from(d) >= min => {}
                _ => return false,
            }
        }

        if let Some(max) = self.max_price {
            // Records without a price are kept.
            if record.pricing.is_some_and(|p| p.deal_price > max) {
                return false;
            }
        }

        true
    }

    /// Order-preserving filter.
    pub fn apply(&self, records: Vec<DealRecord>) -> Vec<DealRecord> {
        records.into_iter().filter(|r| self.matches(r)).collect()
    }
}

fn contains_any(haystack: &str, keywords: &[String]) -> bool {
    keywords.iter().any(|kw| haystack.contains(kw.as_str()))
}

fn lowercase_all(items: Vec<String>) -> Vec<String> {
    items.into_iter().map(|k| k.to_lowercase()).collect()
}

/// Split a comma-separated list, trimming, lowercasing and dropping blanks.
/// Duplicates are removed, first occurrence wins.
pub fn parse_keyword_csv(raw: &str) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for kw in raw.split(',').map(|s| s.trim().to_lowercase()) {
        if !kw.is_empty() && !out.contains(&kw) {
            out.push(kw);
        }
    }
    out
}
