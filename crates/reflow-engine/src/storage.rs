//! Durable key-value persistence boundary.
//!
//! The engine treats the store as opaque: atomic per call, assumed complete
//! when the call returns. That completion guarantee is what the replay state
//! machine leans on before any action that can tear the process down.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use std::path::PathBuf;
use tokio::fs;
use tokio::sync::Mutex;

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Well-known keys.
pub mod keys {
    /// The sequence currently being captured.
    pub const WORKING_SEQUENCE: &str = "working_sequence";
    /// Cross-incarnation control flags.
    pub const SESSION: &str = "session";
    /// Continuation of an in-flight replay.
    pub const PENDING_REPLAY: &str = "pending_replay";
    /// Saved flows live under this prefix, one key per flow name.
    pub const FLOW_PREFIX: &str = "flow/";
}

/// Opaque durable store. Individual calls are atomic; a returned `Ok` means
/// the write is acknowledged.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<serde_json::Value>, StorageError>;
    async fn set(&self, key: &str, value: serde_json::Value) -> Result<(), StorageError>;
    async fn remove(&self, key: &str) -> Result<(), StorageError>;
    /// Keys starting with `prefix`, in unspecified order.
    async fn list(&self, prefix: &str) -> Result<Vec<String>, StorageError>;
}

/// Typed read.
pub async fn get_typed<T: DeserializeOwned>(
    store: &dyn KeyValueStore,
    key: &str,
) -> Result<Option<T>, StorageError> {
    match store.get(key).await? {
        Some(value) => Ok(Some(serde_json::from_value(value)?)),
        None => Ok(None),
    }
}

/// Typed write.
pub async fn set_typed<T: Serialize>(
    store: &dyn KeyValueStore,
    key: &str,
    value: &T,
) -> Result<(), StorageError> {
    store.set(key, serde_json::to_value(value)?).await
}

/// In-memory store for tests and embedded use.
#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, serde_json::Value>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<serde_json::Value>, StorageError> {
        Ok(self.entries.lock().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: serde_json::Value) -> Result<(), StorageError> {
        self.entries.lock().await.insert(key.to_string(), value);
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.entries.lock().await.remove(key);
        Ok(())
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>, StorageError> {
        Ok(self
            .entries
            .lock()
            .await
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect())
    }
}

/// File-backed store: one JSON file per key under a base directory.
/// Writes go to a temp file and are renamed into place so an acknowledged
/// write survives a teardown immediately after.
pub struct FileStore {
    base_path: PathBuf,
}

impl FileStore {
    pub fn new(base_path: PathBuf) -> Self {
        Self { base_path }
    }

    pub fn default_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".reflow")
            .join("store")
    }

    fn file_for(&self, key: &str) -> PathBuf {
        // Keys may contain '/' (flow names); flatten for the filesystem.
        let name = key.replace('/', "__");
        self.base_path.join(format!("{name}.json"))
    }

    fn key_for(file_stem: &str) -> String {
        file_stem.replace("__", "/")
    }
}

#[async_trait]
impl KeyValueStore for FileStore {
    async fn get(&self, key: &str) -> Result<Option<serde_json::Value>, StorageError> {
        let path = self.file_for(key);
        if !path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(&path).await?;
        Ok(Some(serde_json::from_str(&content)?))
    }

    async fn set(&self, key: &str, value: serde_json::Value) -> Result<(), StorageError> {
        if !self.base_path.exists() {
            fs::create_dir_all(&self.base_path).await?;
        }
        let path = self.file_for(key);
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, serde_json::to_vec_pretty(&value)?).await?;
        fs::rename(&tmp, &path).await?;
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), StorageError> {
        let path = self.file_for(key);
        if path.exists() {
            fs::remove_file(path).await?;
        }
        Ok(())
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>, StorageError> {
        if !self.base_path.exists() {
            return Ok(Vec::new());
        }
        let mut keys = Vec::new();
        let mut entries = fs::read_dir(&self.base_path).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                let key = Self::key_for(stem);
                if key.starts_with(prefix) {
                    keys.push(key);
                }
            }
        }
        Ok(keys)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn memory_store_round_trip() {
        let store = MemoryStore::new();
        store
            .set("a", serde_json::json!({"n": 1}))
            .await
            .unwrap();
        assert_eq!(
            store.get("a").await.unwrap(),
            Some(serde_json::json!({"n": 1}))
        );
        store.remove("a").await.unwrap();
        assert_eq!(store.get("a").await.unwrap(), None);
    }

    #[tokio::test]
    async fn file_store_round_trip_and_listing() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path().to_path_buf());

        store
            .set("flow/checkout", serde_json::json!("x"))
            .await
            .unwrap();
        store.set("session", serde_json::json!("y")).await.unwrap();

        assert_eq!(
            store.get("flow/checkout").await.unwrap(),
            Some(serde_json::json!("x"))
        );
        let flows = store.list(keys::FLOW_PREFIX).await.unwrap();
        assert_eq!(flows, vec!["flow/checkout".to_string()]);

        store.remove("flow/checkout").await.unwrap();
        assert_eq!(store.get("flow/checkout").await.unwrap(), None);
    }
}
