// src/notify/format.rs
//! Discord message payloads for pushes, summaries and command replies.

use serde::Serialize;
use time::{format_description::well_known::Rfc2822, macros::format_description, OffsetDateTime, UtcOffset};

use crate::ingest::types::DealRecord;

/// Discord rejects messages with more embeds than this.
pub const MAX_EMBEDS_PER_MESSAGE: usize = 10;

pub const COLOR_NEW_DEAL: u32 = 0xED4245;
pub const COLOR_LIST: u32 = 0xFF6A00;

#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct WebhookMessage {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub embeds: Vec<Embed>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allowed_mentions: Option<AllowedMentions>,
}

/// `{"parse": []}` suppresses every mention.
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct AllowedMentions {
    pub parse: Vec<String>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Embed {
    pub title: String,
    pub url: String,
    pub description: String,
    pub color: u32,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<EmbedField>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<EmbedImage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub footer: Option<EmbedFooter>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct EmbedField {
    pub name: String,
    pub value: String,
    pub inline: bool,
}

impl EmbedField {
    fn new(name: &str, value: String, inline: bool) -> Self {
        Self {
            name: name.to_string(),
            value,
            inline,
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct EmbedImage {
    pub url: String,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct EmbedFooter {
    pub text: String,
}

/// Cut to `max` chars, ending in `...` when shortened.
pub fn truncate(value: &str, max: usize) -> String {
    if value.chars().count() <= max {
        return value.to_string();
    }
    let mut out: String = value.chars().take(max.saturating_sub(3)).collect();
    out.push_str("...");
    out
}

/// RFC 2822 timestamp as `YYYY-MM-DD HH:MM` (UTC); other input is returned as-is.
pub fn format_posted(pub_date: &str) -> String {
    let fmt = format_description!("[year]-[month]-[day] [hour]:[minute]");
    OffsetDateTime::parse(pub_date.trim(), &Rfc2822)
        .ok()
        .and_then(|dt| dt.to_offset(UtcOffset::UTC).format(fmt).ok())
        .unwrap_or_else(|| pub_date.to_string())
}

fn mention_prefix(user_id: Option<&str>) -> String {
    user_id.map(|id| format!("<@{id}> ")).unwrap_or_default()
}

fn thumbnail(deal: &DealRecord) -> Option<EmbedImage> {
    deal.image.clone().map(|url| EmbedImage { url })
}

/// Single rich message announcing one new deal.
pub fn new_deal_message(deal: &DealRecord, user_id: Option<&str>) -> WebhookMessage {
    let mut fields = Vec::new();
    let meta = deal.vendor_meta.as_ref();

    if let Some(p) = deal.pricing {
        fields.push(EmbedField::new("Deal Price", format!("${:.2}", p.deal_price), true));
        if let Some(orig) = p.original_price {
            fields.push(EmbedField::new("Original Price", format!("${orig:.2}"), true));
        }
        if let Some(d) = p.discount_percent {
            fields.push(EmbedField::new("Discount", format!("{d}%"), true));
        }
    }
    if let Some(url) = meta.and_then(|m| m.url.clone()) {
        fields.push(EmbedField::new("Store Link", url, false));
    }
    if !deal.categories.is_empty() {
        let cats: Vec<&str> = deal.categories.iter().take(4).map(String::as_str).collect();
        fields.push(EmbedField::new("Category", cats.join(", "), true));
    }
    if let Some(c) = meta.and_then(|m| m.comment_count) {
        fields.push(EmbedField::new("Comments", c.to_string(), true));
    }
    if let Some(pos) = meta.and_then(|m| m.votes_pos) {
        let neg = meta.and_then(|m| m.votes_neg).unwrap_or(0);
        fields.push(EmbedField::new("Votes", format!("+{pos} / -{neg}"), true));
    }
    if let Some(expiry) = meta.and_then(|m| m.expiry.clone()) {
        fields.push(EmbedField::new("Expiry", expiry, true));
    }

    let posted = if deal.published_at.is_empty() {
        String::new()
    } else {
        format!(" - Posted: {}", format_posted(&deal.published_at))
    };

    WebhookMessage {
        content: Some(format!(
            "{}🚨 **NEW DEAL DETECTED**{posted}",
            mention_prefix(user_id)
        )),
        embeds: vec![Embed {
            title: deal.title.clone(),
            url: deal.link.clone(),
            description: truncate(&deal.description, 200),
            color: COLOR_NEW_DEAL,
            fields,
            thumbnail: thumbnail(deal),
            footer: (!deal.published_at.is_empty()).then(|| EmbedFooter {
                text: deal.published_at.clone(),
            }),
        }],
        allowed_mentions: None,
    }
}

/// Numbered compact embeds, in the given order.
pub fn deal_list_embeds(deals: &[DealRecord]) -> Vec<Embed> {
    deals
        .iter()
        .enumerate()
        .map(|(i, deal)| {
            let mut fields = Vec::new();
            let meta = deal.vendor_meta.as_ref();
            if let Some(p) = deal.pricing {
                fields.push(EmbedField::new("💰 Price", format!("${:.2}", p.deal_price), true));
                if let Some(d) = p.discount_percent.filter(|d| *d > 0) {
                    fields.push(EmbedField::new("📊 Discount", format!("{d}%"), true));
                }
            }
            if let Some(pos) = meta.and_then(|m| m.votes_pos) {
                let neg = meta.and_then(|m| m.votes_neg).unwrap_or(0);
                let votes = if neg > 0 {
                    format!("+{pos} / -{neg}")
                } else {
                    format!("+{pos}")
                };
                fields.push(EmbedField::new("👍 Votes", votes, true));
            }
            if let Some(c) = meta.and_then(|m| m.comment_count) {
                fields.push(EmbedField::new("💬 Comments", c.to_string(), true));
            }

            Embed {
                title: format!("{}. {}", i + 1, truncate(&deal.title, 200)),
                url: deal.link.clone(),
                description: truncate(&deal.description, 150),
                color: COLOR_LIST,
                fields,
                thumbnail: thumbnail(deal),
                footer: None,
            }
        })
        .collect()
}

/// Split embeds into messages; `heading` goes on the first one only.
fn batch_messages(
    embeds: Vec<Embed>,
    heading: String,
    allowed_mentions: Option<AllowedMentions>,
) -> Vec<WebhookMessage> {
    embeds
        .chunks(MAX_EMBEDS_PER_MESSAGE)
        .enumerate()
        .map(|(i, chunk)| WebhookMessage {
            content: (i == 0).then(|| heading.clone()),
            embeds: chunk.to_vec(),
            allowed_mentions: allowed_mentions.clone(),
        })
        .collect()
}

/// Summary messages. `deals` come newest-first and are shown oldest-first.
pub fn summary_messages(
    deals: &[DealRecord],
    user_id: Option<&str>,
    label: &str,
) -> Vec<WebhookMessage> {
    let ordered: Vec<DealRecord> = deals.iter().rev().cloned().collect();
    batch_messages(
        deal_list_embeds(&ordered),
        format!("{}📊 **{label}**", mention_prefix(user_id)),
        None,
    )
}

/// Follow-up messages for the slash command. `deals` are already in display order.
pub fn command_messages(deals: &[DealRecord]) -> Vec<WebhookMessage> {
    batch_messages(
        deal_list_embeds(deals),
        "🔥 **Latest Deals**".to_string(),
        Some(AllowedMentions::default()),
    )
}

/// Plain text reply with mentions disabled.
pub fn text_message(content: impl Into<String>) -> WebhookMessage {
    WebhookMessage {
        content: Some(content.into()),
        embeds: Vec::new(),
        allowed_mentions: Some(AllowedMentions::default()),
    }
}
