pub mod history;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::RwLock;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("value at {key} is not a counter")]
    NotACounter { key: String },

    #[error("malformed value at {key}: {source}")]
    Malformed {
        key: String,
        source: serde_json::Error,
    },
}

/// The key-value capability that history, plan lookups and other caller
/// state go through. The pipeline itself never touches it.
#[async_trait]
pub trait KvStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    async fn set(&self, key: &str, value: String) -> Result<(), StoreError>;

    /// Add one to the counter at `key` (missing counts as zero) and return
    /// the new value.
    async fn increment(&self, key: &str) -> Result<u64, StoreError>;

    /// Replace the value at `key` with `apply(current)` as one atomic step and
    /// return the stored value. Nothing is written when `apply` fails.
    async fn update(&self, key: &str, apply: &Updater<'_>) -> Result<String, StoreError>;
}

/// Read-modify-write step passed to [`KvStore::update`].
pub type Updater<'a> = dyn Fn(Option<&str>) -> Result<String, StoreError> + Send + Sync + 'a;

/// In-process [`KvStore`].
///
/// Cheaply cloneable; all clones share the same map via `Arc`.
#[derive(Clone, Default)]
pub struct MemoryStore {
    entries: Arc<RwLock<HashMap<String, String>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[async_trait]
impl KvStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: String) -> Result<(), StoreError> {
        self.entries.write().await.insert(key.to_owned(), value);
        Ok(())
    }

    async fn increment(&self, key: &str) -> Result<u64, StoreError> {
        let mut entries = self.entries.write().await;
        let current = match entries.get(key) {
            Some(raw) => raw.parse::<u64>().map_err(|_| StoreError::NotACounter {
                key: key.to_owned(),
            })?,
            None => 0,
        };
        let next = current + 1;
        entries.insert(key.to_owned(), next.to_string());
        Ok(next)
    }

    async fn update(&self, key: &str, apply: &Updater<'_>) -> Result<String, StoreError> {
        let mut entries = self.entries.write().await;
        let next = apply(entries.get(key).map(String::as_str))?;
        entries.insert(key.to_owned(), next.clone());
        Ok(next)
    }
}

// ── Unit tests ────────────────────────────────────────────────────────────────
