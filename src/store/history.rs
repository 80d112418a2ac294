use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{KvStore, StoreError};
use crate::models::{CheckResult, ErrorKind, Severity};

/// Entries kept per identity; older ones are dropped.
pub const HISTORY_LIMIT: usize = 20;

/// Compact record of one check, newest first in storage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    pub id: u64,
    pub url: String,
    pub checked_at: DateTime<Utc>,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_type: Option<ErrorKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub errors: usize,
    pub warnings: usize,
}

impl HistoryEntry {
    pub fn from_result(id: u64, url: &str, checked_at: DateTime<Utc>, result: &CheckResult) -> Self {
        let warnings = result
            .issues
            .iter()
            .flatten()
            .filter(|issue| issue.severity == Severity::Warning)
            .count();

        HistoryEntry {
            id,
            url: result.original_url.clone().unwrap_or_else(|| url.to_string()),
            checked_at,
            success: result.success,
            error_type: result.error_type,
            title: result.data.as_ref().and_then(|d| d.title.clone()),
            errors: result.error_count(),
            warnings,
        }
    }
}

fn history_key(identity: &str) -> String {
    format!("history:{identity}")
}

fn sequence_key(identity: &str) -> String {
    format!("history_seq:{identity}")
}

fn decode(key: &str, raw: Option<&str>) -> Result<Vec<HistoryEntry>, StoreError> {
    match raw {
        Some(raw) => serde_json::from_str(raw).map_err(|source| StoreError::Malformed {
            key: key.to_owned(),
            source,
        }),
        None => Ok(Vec::new()),
    }
}

pub async fn load(store: &dyn KvStore, identity: &str) -> Result<Vec<HistoryEntry>, StoreError> {
    let key = history_key(identity);
    let raw = store.get(&key).await?;
    decode(&key, raw.as_deref())
}

/// Prepend a record of `result` to the identity's history.
pub async fn record(
    store: &dyn KvStore,
    identity: &str,
    url: &str,
    result: &CheckResult,
) -> Result<HistoryEntry, StoreError> {
    let id = store.increment(&sequence_key(identity)).await?;
    let entry = HistoryEntry::from_result(id, url, Utc::now(), result);

    let key = history_key(identity);
    let prepend = |current: Option<&str>| {
        let mut entries = decode(&key, current)?;
        entries.insert(0, entry.clone());
        entries.truncate(HISTORY_LIMIT);
        serde_json::to_string(&entries).map_err(|source| StoreError::Malformed {
            key: key.clone(),
            source,
        })
    };
    store.update(&key, &prepend).await?;
    Ok(entry)
}
