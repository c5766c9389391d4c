// src/store.rs
//! Minimal key-value capability backing the persisted novelty state.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Mutex;

use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio::fs;

#[async_trait]
pub trait KvStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>>;
    async fn put(&self, key: &str, value: &str) -> Result<()>;
}

/// Process-local store. State is lost on restart.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<BTreeMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KvStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let map = self.inner.lock().expect("store mutex poisoned");
        Ok(map.get(key).cloned())
    }

    async fn put(&self, key: &str, value: &str) -> Result<()> {
        let mut map = self.inner.lock().expect("store mutex poisoned");
        map.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// JSON object on disk. Each `put` rewrites the file through a temp file +
/// rename, so a crash leaves either the old or the new map.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    write_lock: tokio::sync::Mutex<()>,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: tokio::sync::Mutex::new(()),
        }
    }

    async fn read_map(&self) -> Result<BTreeMap<String, String>> {
        match fs::read_to_string(&self.path).await {
            Ok(s) if s.trim().is_empty() => Ok(BTreeMap::new()),
            Ok(s) => match serde_json::from_str(&s) {
                Ok(map) => Ok(map),
                Err(e) => {
                    tracing::warn!(target: "store", path = %self.path.display(), "unreadable state file, starting empty: {e}");
                    Ok(BTreeMap::new())
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(e) => {
                Err(e).with_context(|| format!("reading state file {}", self.path.display()))
            }
        }
    }
}

#[async_trait]
impl KvStore for FileStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.read_map().await?.remove(key))
    }

    async fn put(&self, key: &str, value: &str) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let mut map = self.read_map().await?;
        map.insert(key.to_string(), value.to_string());

        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir)
                .await
                .with_context(|| format!("creating state dir {}", dir.display()))?;
        }
        let tmp = self.path.with_extension("json.tmp");
        let bytes = serde_json::to_vec_pretty(&map).context("encoding state map")?;
        fs::write(&tmp, bytes)
            .await
            .with_context(|| format!("writing {}", tmp.display()))?;
        fs::rename(&tmp, &self.path)
            .await
            .with_context(|| format!("replacing {}", self.path.display()))?;
        Ok(())
    }
}
