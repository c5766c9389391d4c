// src/config/filters.rs
//! Optional keyword lists on disk, layered over `KEYWORDS_INCLUDE` / `KEYWORDS_EXCLUDE`.
use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

pub const ENV_PATH: &str = "DEAL_FILTERS_PATH";

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct KeywordLists {
    #[serde(default)]
    pub include: Vec<String>,
    #[serde(default)]
    pub exclude: Vec<String>,
}

/// Load keyword lists from an explicit path. Supports TOML or JSON formats.
pub fn load_keyword_file(path: &Path) -> Result<KeywordLists> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("reading keyword lists from {}", path.display()))?;
    let ext = path
        .extension()
        .and_then(|s| s.to_str())
        .unwrap_or_default()
        .to_ascii_lowercase();
    parse_keyword_lists(&content, ext.as_str())
}

/// `$DEAL_FILTERS_PATH` if set (must exist), otherwise nothing.
pub fn load_keyword_file_from_env() -> Result<Option<KeywordLists>> {
    let Ok(p) = std::env::var(ENV_PATH) else {
        return Ok(None);
    };
    let pb = PathBuf::from(p.trim());
    if !pb.exists() {
        return Err(anyhow!("{ENV_PATH} points to non-existent path"));
    }
    load_keyword_file(&pb).map(Some)
}

fn parse_keyword_lists(s: &str, hint_ext: &str) -> Result<KeywordLists> {
    // JSON unless hinted as TOML; then try the other one.
    let parsed = if hint_ext == "toml" {
        toml::from_str::<KeywordLists>(s)
            .map_err(anyhow::Error::from)
            .or_else(|_| serde_json::from_str::<KeywordLists>(s).map_err(anyhow::Error::from))
    } else {
        serde_json::from_str::<KeywordLists>(s)
            .map_err(anyhow::Error::from)
            .or_else(|_| toml::from_str::<KeywordLists>(s).map_err(anyhow::Error::from))
    };
    let lists = parsed.map_err(|_| anyhow!("unsupported keyword list format"))?;
    Ok(KeywordLists {
        include: clean_list(lists.include),
        exclude: clean_list(lists.exclude),
    })
}

fn clean_list(items: Vec<String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for it in items {
        let t = it.trim().to_lowercase();
        if !t.is_empty() && !out.contains(&t) {
            out.push(t);
        }
    }
    out
}
