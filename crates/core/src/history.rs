use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::store::{StoreError, read_json, write_json};

const HISTORY_FILE: &str = "history.json";

/// A completed question and its answer.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    /// The conversation holding the exchange.
    pub conversation_id: String,
    /// The submitted question.
    pub question: String,
    /// The final answer.
    pub answer: String,
    /// When the answer completed.
    pub date: DateTime<Utc>,
    /// Display name of the agent that answered.
    #[serde(default)]
    pub agent: String,
}

/// Append-only history of completed exchanges, kept in a JSON file.
///
/// Updates go through a lock shared by the clones of a store, so
/// concurrent appends from one store never lose entries. Separate stores
/// over the same file do not share it.
#[derive(Clone, Debug)]
pub struct HistoryStore {
    path: PathBuf,
    lock: Arc<Mutex<()>>,
}

impl HistoryStore {
    /// Creates a store backed by the file at `path`.
    #[inline]
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self {
            path: path.into(),
            lock: Arc::default(),
        }
    }

    /// Creates a store backed by `history.json` inside `dir`.
    #[inline]
    pub fn in_dir<P: AsRef<Path>>(dir: P) -> Self {
        Self::new(dir.as_ref().join(HISTORY_FILE))
    }

    /// Returns the backing file.
    #[inline]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads every entry, newest first.
    pub async fn load(&self) -> Result<Vec<HistoryEntry>, StoreError> {
        let mut entries = self.load_raw().await?;
        entries.sort_by(|a, b| b.date.cmp(&a.date));
        Ok(entries)
    }

    /// Appends an entry.
    pub async fn append(&self, entry: HistoryEntry) -> Result<(), StoreError> {
        let _guard = self.lock.lock().await;
        let mut entries = self.load_raw().await?;
        entries.push(entry);
        write_json(&self.path, &entries).await
    }

    /// Removes the entries of a conversation. Returns `true` if anything
    /// was removed.
    pub async fn remove(
        &self,
        conversation_id: &str,
    ) -> Result<bool, StoreError> {
        let _guard = self.lock.lock().await;
        let mut entries = self.load_raw().await?;
        let len = entries.len();
        entries.retain(|entry| entry.conversation_id != conversation_id);
        if entries.len() == len {
            return Ok(false);
        }
        write_json(&self.path, &entries).await?;
        Ok(true)
    }

    /// Removes every entry.
    pub async fn clear(&self) -> Result<(), StoreError> {
        let _guard = self.lock.lock().await;
        write_json(&self.path, &Vec::<HistoryEntry>::new()).await
    }

    async fn load_raw(&self) -> Result<Vec<HistoryEntry>, StoreError> {
        Ok(read_json(&self.path).await?.unwrap_or_default())
    }
}
