use serde_json::Value;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::TranscriptStoreError;
use crate::kv::KeyValueStore;
use crate::schema::StoredLine;

/// Key holding the conversation thread identifier.
pub const THREAD_ID_KEY: &str = "thread_id";
/// Key holding the serialized line history.
pub const HISTORY_KEY: &str = "terminal_history";

/// Typed access to the persisted thread id and line history.
#[derive(Debug)]
pub struct TranscriptStore<S> {
    kv: S,
}

impl<S: KeyValueStore> TranscriptStore<S> {
    pub fn new(kv: S) -> Self {
        Self { kv }
    }

    pub fn kv(&self) -> &S {
        &self.kv
    }

    /// Loads the persisted history.
    ///
    /// Legacy payloads (an array whose first element is itself an array) and
    /// unparsable payloads are removed and reported as an empty history.
    pub fn load_history(&mut self) -> Result<Vec<StoredLine>, TranscriptStoreError> {
        let Some(raw) = self.kv.get(HISTORY_KEY)? else {
            return Ok(Vec::new());
        };

        let value = match serde_json::from_str::<Value>(&raw) {
            Ok(value) => value,
            Err(error) => {
                warn!(%error, "discarding unparsable history");
                self.kv.remove(HISTORY_KEY)?;
                return Ok(Vec::new());
            }
        };

        if is_legacy_history(&value) {
            warn!("discarding legacy-format history");
            self.kv.remove(HISTORY_KEY)?;
            return Ok(Vec::new());
        }

        match serde_json::from_value::<Vec<StoredLine>>(value) {
            Ok(lines) => {
                debug!(lines = lines.len(), "history loaded");
                Ok(lines)
            }
            Err(error) => {
                warn!(%error, "discarding history with unexpected shape");
                self.kv.remove(HISTORY_KEY)?;
                Ok(Vec::new())
            }
        }
    }

    /// Persists `lines`. An empty history is never written.
    pub fn save_history(&mut self, lines: &[StoredLine]) -> Result<(), TranscriptStoreError> {
        if lines.is_empty() {
            return Ok(());
        }
        let raw = serde_json::to_string(lines)
            .map_err(|source| TranscriptStoreError::serialize(HISTORY_KEY, source))?;
        self.kv.set(HISTORY_KEY, &raw)
    }

    /// Returns the stored thread id, generating and storing a new one if absent.
    ///
    /// The id is stored as a JSON string. A plain-text value written by older
    /// builds is still accepted. Storage failures are logged; the generated id
    /// is still returned.
    pub fn thread_id(&mut self) -> String {
        match self.kv.get(THREAD_ID_KEY) {
            Ok(Some(stored)) => {
                if let Some(thread_id) = decode_thread_id(&stored) {
                    return thread_id;
                }
            }
            Ok(None) => {}
            Err(error) => warn!(%error, "failed to read stored thread id"),
        }

        let thread_id = Uuid::new_v4().to_string();
        if let Err(error) = self.store_thread_id(&thread_id) {
            warn!(%error, "failed to persist generated thread id");
        }
        thread_id
    }

    fn store_thread_id(&mut self, thread_id: &str) -> Result<(), TranscriptStoreError> {
        let raw = serde_json::to_string(thread_id)
            .map_err(|source| TranscriptStoreError::serialize(THREAD_ID_KEY, source))?;
        self.kv.set(THREAD_ID_KEY, &raw)
    }
}

fn decode_thread_id(raw: &str) -> Option<String> {
    let decoded = serde_json::from_str::<String>(raw).unwrap_or_else(|_| raw.to_string());
    let trimmed = decoded.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

fn is_legacy_history(value: &Value) -> bool {
    value
        .as_array()
        .and_then(|items| items.first())
        .is_some_and(Value::is_array)
}
