//! Durable key-value storage behind the engine
//!
//! Assignments, per-user engine state, and the event queue all persist
//! through this trait. Any store with get/set/delete semantics suffices;
//! the engine never assumes transactions or cross-key atomicity.

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, RwLock};

/// Error type for key-value operations.
#[derive(Debug, thiserror::Error)]
pub enum KvError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("lock poisoned")]
    LockPoisoned,
}

/// Result type for key-value operations.
pub type KvResult<T> = Result<T, KvError>;

/// Shared reference to a key-value store.
pub type SharedKvStore = Arc<dyn KvStore>;

/// Minimal durable key-value contract.
///
/// Values are serialized JSON strings; callers own the (de)serialization so
/// a backend never needs to understand record shapes.
#[async_trait]
pub trait KvStore: Send + Sync {
    /// Fetch the value stored under `key`, if any.
    async fn get(&self, key: &str) -> KvResult<Option<String>>;

    /// Store `value` under `key`, replacing any existing value.
    async fn set(&self, key: &str, value: &str) -> KvResult<()>;

    /// Remove `key`. Deleting a missing key is not an error.
    async fn delete(&self, key: &str) -> KvResult<()>;

    /// List all keys starting with `prefix`.
    async fn list_keys(&self, prefix: &str) -> KvResult<Vec<String>>;
}

/// In-memory store for tests and ephemeral sessions.
#[derive(Default)]
pub struct MemoryKvStore {
    entries: RwLock<HashMap<String, String>>,
}

impl MemoryKvStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap in a shared handle.
    pub fn shared() -> SharedKvStore {
        Arc::new(Self::new())
    }
}

#[async_trait]
impl KvStore for MemoryKvStore {
    async fn get(&self, key: &str) -> KvResult<Option<String>> {
        let entries = self.entries.read().map_err(|_| KvError::LockPoisoned)?;
        Ok(entries.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> KvResult<()> {
        let mut entries = self.entries.write().map_err(|_| KvError::LockPoisoned)?;
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn delete(&self, key: &str) -> KvResult<()> {
        let mut entries = self.entries.write().map_err(|_| KvError::LockPoisoned)?;
        entries.remove(key);
        Ok(())
    }

    async fn list_keys(&self, prefix: &str) -> KvResult<Vec<String>> {
        let entries = self.entries.read().map_err(|_| KvError::LockPoisoned)?;
        let mut keys: Vec<String> = entries
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect();
        keys.sort();
        Ok(keys)
    }
}

/// File-backed store: one JSON file per key under a root directory.
///
/// Keys are sanitized into filenames (`:` and `/` become `_`) and suffixed
/// with the key's hash so distinct keys never share a file. The original
/// key is recorded inside the file and verified on every read and delete.
pub struct JsonFileKvStore {
    root: PathBuf,
}

#[derive(serde::Serialize, serde::Deserialize)]
struct FileEntry {
    key: String,
    value: String,
}

impl JsonFileKvStore {
    /// Open (creating if needed) a store rooted at `root`.
    pub fn open(root: impl Into<PathBuf>) -> KvResult<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    /// Wrap in a shared handle.
    pub fn shared(self) -> SharedKvStore {
        Arc::new(self)
    }

    fn path_for(&self, key: &str) -> PathBuf {
        let sanitized: String = key
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '.' {
                c
            } else {
                '_'
            })
            .collect();
        // Sanitization is lossy ("a_b" and "a:b" both sanitize to "a_b"),
        // so the filename also carries the hash of the exact key.
        self.root.join(format!(
            "{}-{:08x}.json",
            sanitized,
            crate::hashing::hash32(key)
        ))
    }

    fn read_entry(path: &std::path::Path) -> KvResult<Option<FileEntry>> {
        match std::fs::read_to_string(path) {
            Ok(json) => Ok(serde_json::from_str(&json).ok()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(KvError::Io(e)),
        }
    }
}

#[async_trait]
impl KvStore for JsonFileKvStore {
    async fn get(&self, key: &str) -> KvResult<Option<String>> {
        Ok(Self::read_entry(&self.path_for(key))?
            .filter(|e| e.key == key)
            .map(|e| e.value))
    }

    async fn set(&self, key: &str, value: &str) -> KvResult<()> {
        let entry = FileEntry {
            key: key.to_string(),
            value: value.to_string(),
        };
        let json = serde_json::to_string_pretty(&entry)
            .map_err(|e| KvError::Io(std::io::Error::new(std::io::ErrorKind::Other, e)))?;
        std::fs::write(self.path_for(key), json)?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> KvResult<()> {
        let path = self.path_for(key);
        // Only remove a file that actually holds this key.
        match Self::read_entry(&path)? {
            Some(entry) if entry.key == key => match std::fs::remove_file(&path) {
                Ok(()) => Ok(()),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
                Err(e) => Err(KvError::Io(e)),
            },
            _ => Ok(()),
        }
    }

    async fn list_keys(&self, prefix: &str) -> KvResult<Vec<String>> {
        let mut keys = Vec::new();
        for dirent in std::fs::read_dir(&self.root)? {
            let dirent = dirent?;
            if let Some(entry) = Self::read_entry(&dirent.path())? {
                if entry.key.starts_with(prefix) {
                    keys.push(entry.key);
                }
            }
        }
        keys.sort();
        Ok(keys)
    }
}
