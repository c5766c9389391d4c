// src/ingest/pricing.rs
//! Best-effort price heuristic: the cheapest currency token is the deal price,
//! the most expensive one the original price. Unrelated prices in the same text
//! will be misattributed; that is accepted.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::ingest::types::Pricing;

static RE_PRICE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\$([0-9]+(?:\.[0-9]{1,2})?)").expect("price regex"));

/// All `$`-prefixed amounts in `text`, in order of appearance.
pub fn find_prices(text: &str) -> Vec<f64> {
    RE_PRICE
        .captures_iter(text)
        .filter_map(|caps| caps.get(1))
        .filter_map(|m| m.as_str().parse::<f64>().ok())
        .filter(|p| p.is_finite())
        .collect()
}

/// Derive (deal, original, discount) from free text, or `None` without prices.
pub fn extract(text: &str) -> Option<Pricing> {
    build_pricing(&find_prices(text))
}

pub fn build_pricing(prices: &[f64]) -> Option<Pricing> {
    let mut sorted = prices.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));

    let deal_price = *sorted.first()?;
    let max = *sorted.last()?;

    // A second token only counts when it is a different amount.
    let original_price = (max != deal_price).then_some(max);
    let discount_percent = original_price
        .filter(|orig| *orig > deal_price)
        .map(|orig| ((orig - deal_price) / orig * 100.0).round() as u32);

    Some(Pricing {
        deal_price,
        original_price,
        discount_percent,
    })
}
