// src/novelty.rs
//! Novelty tracking: which records in a snapshot have not been announced yet.
//!
//! State is a cursor (`last_guid`, the newest guid at the end of the previous
//! run) plus a bounded most-recent-first list of seen guids. Selection and the
//! state transition are pure functions; persistence goes through [`KvStore`].

use std::collections::HashSet;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::ingest::types::DealRecord;
use crate::store::KvStore;

pub const LAST_GUID_KEY: &str = "last_guid";
pub const SEEN_GUIDS_KEY: &str = "seen_guids";
pub const DEFAULT_SEEN_CAP: usize = 200;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoveltyState {
    pub last_guid: Option<String>,
    pub seen_guids: Vec<String>,
}

impl NoveltyState {
    /// No cursor and nothing seen: nothing was ever stored.
    pub fn is_empty(&self) -> bool {
        self.last_guid.is_none() && self.seen_guids.is_empty()
    }
}

/// Records newer than the cursor (or unseen, when the cursor rotated out),
/// in snapshot order.
pub fn compute_new(snapshot: &[DealRecord], state: &NoveltyState) -> Vec<DealRecord> {
    if let Some(last) = state.last_guid.as_deref() {
        if let Some(pos) = snapshot.iter().position(|r| r.guid == last) {
            return filter_unseen(&snapshot[..pos], &state.seen_guids);
        }
    }
    // Cursor missing or rotated out: with nothing seen, the whole snapshot is new.
    filter_unseen(snapshot, &state.seen_guids)
}

fn filter_unseen(records: &[DealRecord], seen: &[String]) -> Vec<DealRecord> {
    if seen.is_empty() {
        return records.to_vec();
    }
    let seen: HashSet<&str> = seen.iter().map(String::as_str).collect();
    records
        .iter()
        .filter(|r| !seen.contains(r.guid.as_str()))
        .cloned()
        .collect()
}

/// State after processing `snapshot`: cursor at its newest record, snapshot
/// guids prepended to the previous seen list, deduplicated, capped.
pub fn next_state(snapshot: &[DealRecord], state: &NoveltyState, cap: usize) -> NoveltyState {
    let mut set: HashSet<&str> = HashSet::new();
    let seen_guids = snapshot
        .iter()
        .map(|r| r.guid.as_str())
        .chain(state.seen_guids.iter().map(String::as_str))
        .filter(|g| set.insert(*g))
        .take(cap)
        .map(str::to_string)
        .collect();

    NoveltyState {
        last_guid: snapshot
            .first()
            .map(|r| r.guid.clone())
            .or_else(|| state.last_guid.clone()),
        seen_guids,
    }
}

/// Outcome of novelty selection for one run.
#[derive(Debug, Clone, PartialEq)]
pub enum Selection {
    /// First activation: store a baseline, announce nothing.
    Bootstrap,
    /// Records to announce (may be empty), snapshot order.
    Fresh(Vec<DealRecord>),
}

#[derive(Debug, Clone, Copy)]
pub struct NoveltyTracker {
    pub cap: usize,
    pub send_on_first_run: bool,
}

impl Default for NoveltyTracker {
    fn default() -> Self {
        Self {
            cap: DEFAULT_SEEN_CAP,
            send_on_first_run: false,
        }
    }
}

impl NoveltyTracker {
    pub fn new(cap: usize, send_on_first_run: bool) -> Self {
        Self {
            cap,
            send_on_first_run,
        }
    }

    /// Forced runs replay the whole snapshot and never bootstrap.
    pub fn select(&self, snapshot: &[DealRecord], state: &NoveltyState, force: bool) -> Selection {
        if force {
            return Selection::Fresh(snapshot.to_vec());
        }
        if state.is_empty() && !self.send_on_first_run {
            return Selection::Bootstrap;
        }
        Selection::Fresh(compute_new(snapshot, state))
    }

    pub fn advance(&self, snapshot: &[DealRecord], state: &NoveltyState) -> NoveltyState {
        next_state(snapshot, state, self.cap)
    }
}

/// Read persisted state. A malformed seen list reads as empty.
pub async fn load_state(store: &dyn KvStore) -> Result<NoveltyState> {
    let last_guid = store
        .get(LAST_GUID_KEY)
        .await
        .context("reading last guid")?
        .filter(|g| !g.is_empty());
    let seen_guids = match store.get(SEEN_GUIDS_KEY).await.context("reading seen guids")? {
        Some(raw) => serde_json::from_str::<Vec<String>>(&raw).unwrap_or_else(|e| {
            tracing::warn!(target: "novelty", "ignoring malformed seen list: {e}");
            Vec::new()
        }),
        None => Vec::new(),
    };
    Ok(NoveltyState {
        last_guid,
        seen_guids,
    })
}

pub async fn save_state(store: &dyn KvStore, state: &NoveltyState) -> Result<()> {
    let seen = serde_json::to_string(&state.seen_guids).context("encoding seen guids")?;
    store
        .put(SEEN_GUIDS_KEY, &seen)
        .await
        .context("writing seen guids")?;
    if let Some(last) = &state.last_guid {
        store
            .put(LAST_GUID_KEY, last)
            .await
            .context("writing last guid")?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn rec(guid: &str) -> DealRecord {
        DealRecord {
            title: format!("Deal {guid}"),
            link: format!("https://deals.test/{guid}"),
            guid: guid.to_string(),
            published_at: String::new(),
            description: String::new(),
            image: None,
            categories: vec![],
            vendor_meta: None,
            pricing: None,
        }
    }

    fn snap(guids: &[&str]) -> Vec<DealRecord> {
        guids.iter().map(|g| rec(g)).collect()
    }

    fn guids(records: &[DealRecord]) -> Vec<&str> {
        records.iter().map(|r| r.guid.as_str()).collect()
    }

    fn state(last: Option<&str>, seen: &[&str]) -> NoveltyState {
        NoveltyState {
            last_guid: last.map(str::to_string),
            seen_guids: seen.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn items_before_cursor_are_new() {
        let s = snap(&["e", "d", "c", "b"]);
        let st = state(Some("c"), &["c", "b"]);
        assert_eq!(guids(&compute_new(&s, &st)), vec!["e", "d"]);
    }

    #[test]
    fn seen_items_before_cursor_are_dropped() {
        let s = snap(&["e", "d", "c"]);
        let st = state(Some("c"), &["d", "c"]);
        assert_eq!(guids(&compute_new(&s, &st)), vec!["e"]);
    }

    #[test]
    fn rotated_cursor_falls_back_to_seen_set() {
        let s = snap(&["z", "y", "x"]);
        let st = state(Some("gone"), &["y"]);
        assert_eq!(guids(&compute_new(&s, &st)), vec!["z", "x"]);
    }

    #[test]
    fn rotated_cursor_with_empty_seen_returns_everything() {
        let s = snap(&["z", "y"]);
        let st = state(Some("gone"), &[]);
        assert_eq!(guids(&compute_new(&s, &st)), vec!["z", "y"]);
    }

    #[test]
    fn next_state_prepends_dedups_and_caps() {
        let s = snap(&["c", "b", "a"]);
        let st = state(Some("a"), &["b", "a", "old1", "old2"]);
        let next = next_state(&s, &st, 4);
        assert_eq!(next.last_guid.as_deref(), Some("c"));
        assert_eq!(next.seen_guids, vec!["c", "b", "a", "old1"]);
    }

    #[test]
    fn next_state_on_empty_snapshot_keeps_cursor() {
        let st = state(Some("a"), &["a"]);
        assert_eq!(next_state(&[], &st, 10), st);
    }

    #[test]
    fn tracker_bootstraps_only_when_allowed() {
        let s = snap(&["a"]);
        let empty = NoveltyState::default();
        assert_eq!(NoveltyTracker::new(10, false).select(&s, &empty, false), Selection::Bootstrap);
        assert_eq!(
            NoveltyTracker::new(10, true).select(&s, &empty, false),
            Selection::Fresh(s.clone())
        );
        assert_eq!(
            NoveltyTracker::new(10, false).select(&s, &empty, true),
            Selection::Fresh(s.clone())
        );
    }

    #[tokio::test]
    async fn state_roundtrips_through_store() {
        let store = MemoryStore::new();
        assert!(load_state(&store).await.unwrap().is_empty());

        let st = state(Some("b"), &["b", "a"]);
        save_state(&store, &st).await.unwrap();
        assert_eq!(load_state(&store).await.unwrap(), st);
    }

    #[tokio::test]
    async fn malformed_seen_list_reads_as_empty() {
        let store = MemoryStore::new();
        store.put(SEEN_GUIDS_KEY, "{\"not\":\"a list\"}").await.unwrap();
        store.put(LAST_GUID_KEY, "x").await.unwrap();
        let st = load_state(&store).await.unwrap();
        assert_eq!(st.last_guid.as_deref(), Some("x"));
        assert!(st.seen_guids.is_empty());
    }
}
