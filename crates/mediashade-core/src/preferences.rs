//! Preference storage
//!
//! An async key-value store with change notifications. The engine reads one
//! boolean from a synced store and falls back to a local one when the synced
//! store is unavailable.

use serde_json::{Map, Value};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tokio::sync::broadcast;

/// Capacity of each store's change channel
const CHANGE_CHANNEL_CAPACITY: usize = 64;

/// Errors raised by preference stores
#[derive(Error, Debug)]
pub enum PreferenceError {
    #[error("preference store unavailable: {0}")]
    Unavailable(String),

    #[error("preference file error: {0}")]
    Io(#[from] std::io::Error),

    #[error("preference file is not a JSON object: {0}")]
    Format(#[from] serde_json::Error),
}

/// A value change observed on a store
#[derive(Debug, Clone, PartialEq)]
pub struct PreferenceChange {
    pub key: String,
    pub old_value: Option<Value>,
    pub new_value: Option<Value>,
}

/// Async key-value store with change notifications
#[allow(async_fn_in_trait)]
pub trait PreferenceStore {
    /// Read a value; `Ok(None)` when unset.
    async fn get(&self, key: &str) -> Result<Option<Value>, PreferenceError>;

    /// Write a value.
    async fn set(&self, key: &str, value: Value) -> Result<(), PreferenceError>;

    /// Stream of changes, including ones made through other handles.
    fn subscribe(&self) -> broadcast::Receiver<PreferenceChange>;
}

/// Interpret a stored flag: anything but an explicit `false` means enabled.
pub fn flag_enabled(value: Option<&Value>) -> bool {
    !matches!(value, Some(Value::Bool(false)))
}

/// In-process store. Clones share state, so one clone can play another
/// tab or device writing the same synced key.
#[derive(Clone)]
pub struct MemoryStore {
    inner: Arc<MemoryInner>,
}

struct MemoryInner {
    values: Mutex<HashMap<String, Value>>,
    changes: broadcast::Sender<PreferenceChange>,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Self {
            inner: Arc::new(MemoryInner {
                values: Mutex::new(HashMap::new()),
                changes,
                fail_reads: AtomicBool::new(false),
                fail_writes: AtomicBool::new(false),
            }),
        }
    }

    /// Store pre-seeded with one value, without emitting a change
    pub fn with_value(key: &str, value: Value) -> Self {
        let store = Self::new();
        store.lock().insert(key.to_string(), value);
        store
    }

    /// Make every read fail, as when the sync backend is unreachable
    pub fn set_fail_reads(&self, fail: bool) {
        self.inner.fail_reads.store(fail, Ordering::Relaxed);
    }

    /// Make every write fail
    pub fn set_fail_writes(&self, fail: bool) {
        self.inner.fail_writes.store(fail, Ordering::Relaxed);
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, Value>> {
        // A panic while holding the lock leaves plain data behind; keep using it.
        self.inner
            .values
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl PreferenceStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<Value>, PreferenceError> {
        if self.inner.fail_reads.load(Ordering::Relaxed) {
            return Err(PreferenceError::Unavailable("reads disabled".into()));
        }
        Ok(self.lock().get(key).cloned())
    }

    async fn set(&self, key: &str, value: Value) -> Result<(), PreferenceError> {
        if self.inner.fail_writes.load(Ordering::Relaxed) {
            return Err(PreferenceError::Unavailable("writes disabled".into()));
        }

        let old_value = self.lock().insert(key.to_string(), value.clone());
        if old_value.as_ref() != Some(&value) {
            // No subscribers is fine.
            let _ = self.inner.changes.send(PreferenceChange {
                key: key.to_string(),
                old_value,
                new_value: Some(value),
            });
        }
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<PreferenceChange> {
        self.inner.changes.subscribe()
    }
}

/// Local store persisted as a JSON object on disk. Clones share the
/// change channel.
#[derive(Clone)]
pub struct JsonFileStore {
    path: PathBuf,
    changes: broadcast::Sender<PreferenceChange>,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Self {
            path: path.into(),
            changes,
        }
    }

    /// Default location in the platform data directory
    pub fn default_path() -> PathBuf {
        dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("mediashade")
            .join("preferences.json")
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read_all(&self) -> Result<Map<String, Value>, PreferenceError> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) if raw.trim().is_empty() => Ok(Map::new()),
            Ok(raw) => Ok(serde_json::from_str(&raw)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Map::new()),
            Err(e) => Err(e.into()),
        }
    }
}

impl PreferenceStore for JsonFileStore {
    async fn get(&self, key: &str) -> Result<Option<Value>, PreferenceError> {
        Ok(self.read_all().await?.get(key).cloned())
    }

    async fn set(&self, key: &str, value: Value) -> Result<(), PreferenceError> {
        let mut all = self.read_all().await?;
        let old_value = all.insert(key.to_string(), value.clone());

        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&self.path, serde_json::to_string_pretty(&all)?).await?;
        log::debug!("Wrote preference {} to {}", key, self.path.display());

        if old_value.as_ref() != Some(&value) {
            let _ = self.changes.send(PreferenceChange {
                key: key.to_string(),
                old_value,
                new_value: Some(value),
            });
        }
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<PreferenceChange> {
        self.changes.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_flag_enabled() {
        assert!(flag_enabled(None));
        assert!(flag_enabled(Some(&json!(true))));
        assert!(flag_enabled(Some(&json!("false"))));
        assert!(!flag_enabled(Some(&json!(false))));
    }

    #[tokio::test]
    async fn test_memory_store_roundtrip_and_changes() {
        let store = MemoryStore::new();
        let other_tab = store.clone();
        let mut changes = store.subscribe();

        assert_eq!(store.get("k").await.unwrap(), None);
        other_tab.set("k", json!(false)).await.unwrap();
        assert_eq!(store.get("k").await.unwrap(), Some(json!(false)));

        let change = changes.recv().await.unwrap();
        assert_eq!(change.key, "k");
        assert_eq!(change.old_value, None);
        assert_eq!(change.new_value, Some(json!(false)));

        // same value again is not a change
        store.set("k", json!(false)).await.unwrap();
        assert!(changes.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_memory_store_failures() {
        let store = MemoryStore::with_value("k", json!(true));
        store.set_fail_reads(true);
        assert!(matches!(
            store.get("k").await,
            Err(PreferenceError::Unavailable(_))
        ));
        store.set_fail_writes(true);
        assert!(store.set("k", json!(false)).await.is_err());
    }

    #[tokio::test]
    async fn test_json_file_store() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().join("nested").join("prefs.json"));

        assert_eq!(store.get("k").await.unwrap(), None);
        store.set("k", json!(false)).await.unwrap();
        store.set("other", json!(1)).await.unwrap();

        let reopened = JsonFileStore::new(store.path());
        assert_eq!(reopened.get("k").await.unwrap(), Some(json!(false)));
        assert_eq!(reopened.get("other").await.unwrap(), Some(json!(1)));
    }

    #[tokio::test]
    async fn test_json_file_store_rejects_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prefs.json");
        std::fs::write(&path, "[1, 2]").unwrap();

        let store = JsonFileStore::new(&path);
        assert!(matches!(
            store.get("k").await,
            Err(PreferenceError::Format(_))
        ));
    }
}
