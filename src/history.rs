//! Append-only utterance log with durable persistence.
//!
//! Every line the assistant speaks or hears is recorded as an [`Utterance`]
//! and written through a [`HistoryStore`]. The log is capped at the most
//! recent entries (default 20, oldest evicted first) and reloaded on
//! construction so a conversation survives page reloads.

use crate::error::{AssistantError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::Mutex;
use tracing::warn;

/// File name the history is persisted under, relative to the store root.
const HISTORY_FILE: &str = "assistant_history.json";

/// One logged line of spoken or recognized text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Utterance {
    /// The spoken or recognized text.
    pub text: String,
    /// Epoch milliseconds when the line was logged.
    pub timestamp_ms: i64,
    /// `true` when the line came from the user, `false` for the assistant.
    pub from_user: bool,
}

/// Persistence seam for the utterance log.
pub trait HistoryStore: Send + Sync {
    /// Load all persisted utterances, oldest first.
    fn load(&self) -> Result<Vec<Utterance>>;

    /// Replace the persisted record with `entries`.
    fn save(&self, entries: &[Utterance]) -> Result<()>;

    /// Remove the persisted record entirely.
    fn clear(&self) -> Result<()>;
}

/// JSON-file-backed store under a fixed file name.
///
/// Corrupt or unreadable JSON degrades to an empty history rather than
/// failing construction.
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    /// Create a store rooted at `root_dir`. The directory is created lazily
    /// on first save.
    #[must_use]
    pub fn new(root_dir: &Path) -> Self {
        Self {
            path: root_dir.join("history").join(HISTORY_FILE),
        }
    }

    /// Returns the backing file path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl HistoryStore for JsonFileStore {
    fn load(&self) -> Result<Vec<Utterance>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let body = std::fs::read_to_string(&self.path)?;
        match serde_json::from_str(&body) {
            Ok(entries) => Ok(entries),
            Err(e) => {
                warn!("discarding corrupt history {}: {e}", self.path.display());
                Ok(Vec::new())
            }
        }
    }

    fn save(&self, entries: &[Utterance]) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let data = serde_json::to_string(entries)
            .map_err(|e| AssistantError::History(format!("failed to encode history: {e}")))?;
        std::fs::write(&self.path, data)?;
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        if self.path.exists() {
            std::fs::remove_file(&self.path)?;
        }
        Ok(())
    }
}

/// In-memory store for tests and headless embedding.
#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<Vec<Utterance>>,
}

impl HistoryStore for MemoryStore {
    fn load(&self) -> Result<Vec<Utterance>> {
        Ok(self
            .entries
            .lock()
            .map_err(|_| AssistantError::History("store lock poisoned".into()))?
            .clone())
    }

    fn save(&self, entries: &[Utterance]) -> Result<()> {
        *self
            .entries
            .lock()
            .map_err(|_| AssistantError::History("store lock poisoned".into()))? =
            entries.to_vec();
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        self.save(&[])
    }
}

/// Capped utterance log written through a [`HistoryStore`] on every append.
pub struct ConversationLog {
    entries: Vec<Utterance>,
    cap: usize,
    store: Arc<dyn HistoryStore>,
}

impl ConversationLog {
    /// Build a log backed by `store`, reloading any persisted entries.
    ///
    /// A store that fails to load starts the log empty; persistence failures
    /// are never fatal to the conversation.
    pub fn new(cap: usize, store: Arc<dyn HistoryStore>) -> Self {
        let entries = match store.load() {
            Ok(mut entries) => {
                if entries.len() > cap {
                    entries.drain(..entries.len() - cap);
                }
                entries
            }
            Err(e) => {
                warn!("failed to load history: {e}");
                Vec::new()
            }
        };
        Self {
            entries,
            cap,
            store,
        }
    }

    /// Append one utterance, evicting the oldest entry past the cap, and
    /// write the log through to the store.
    pub fn push(&mut self, text: &str, from_user: bool) {
        self.entries.push(Utterance {
            text: text.to_owned(),
            timestamp_ms: chrono::Utc::now().timestamp_millis(),
            from_user,
        });
        if self.entries.len() > self.cap {
            let excess = self.entries.len() - self.cap;
            self.entries.drain(..excess);
        }
        if let Err(e) = self.store.save(&self.entries) {
            warn!("failed to persist history: {e}");
        }
    }

    /// Entries currently held, oldest first.
    #[must_use]
    pub fn entries(&self) -> &[Utterance] {
        &self.entries
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop all entries, in memory and in the store.
    pub fn clear(&mut self) {
        self.entries.clear();
        if let Err(e) = self.store.clear() {
            warn!("failed to clear persisted history: {e}");
        }
    }
}
