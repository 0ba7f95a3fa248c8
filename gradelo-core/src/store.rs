//! Pluggable key-value storage
//!
//! The tracker persists exactly one value through this trait: the client
//! identifier. Hosts embed the tracker on platforms with very different
//! storage APIs, so the backend is a trait with three built-in
//! implementations:
//!
//! - [`InMemoryStore`]: lost on restart, the default for tests
//! - [`FileStore`]: a JSON object on disk, survives restarts
//! - [`NullStore`]: discards writes, every run gets a fresh identity
//!
//! # Example
//!
//! ```rust
//! use gradelo_core::store::{InMemoryStore, KeyValueStore};
//!
//! let store = InMemoryStore::new();
//! store.set("gradelo.client_id", "abc").unwrap();
//! assert_eq!(store.get("gradelo.client_id").unwrap().as_deref(), Some("abc"));
//! ```

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use parking_lot::{Mutex, RwLock};
use tracing::warn;

use crate::error::{TrackerError, TrackerResult};

/// Key-value storage backend
///
/// All methods take `&self` to allow for interior mutability patterns.
pub trait KeyValueStore: Send + Sync {
    /// Read a value
    fn get(&self, key: &str) -> TrackerResult<Option<String>>;

    /// Write a value, replacing any previous one
    fn set(&self, key: &str, value: &str) -> TrackerResult<()>;

    /// Backend name (for logging/debugging)
    fn name(&self) -> &'static str;
}

/// In-memory store
#[derive(Debug, Default)]
pub struct InMemoryStore {
    values: RwLock<HashMap<String, String>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored keys
    pub fn len(&self) -> usize {
        self.values.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.read().is_empty()
    }

    /// Remove every stored value
    pub fn clear(&self) {
        self.values.write().clear();
    }
}

impl KeyValueStore for InMemoryStore {
    fn get(&self, key: &str) -> TrackerResult<Option<String>> {
        Ok(self.values.read().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> TrackerResult<()> {
        self.values.write().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn name(&self) -> &'static str {
        "in-memory"
    }
}

/// File-backed store
///
/// Keeps all keys in a single JSON object file. Writes go to a sibling
/// temporary file first and are renamed into place. A file that is not a
/// JSON object fails reads and is replaced by the next write.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl FileStore {
    /// Create a store backed by `path`, creating parent directories
    pub fn new<P: Into<PathBuf>>(path: P) -> TrackerResult<Self> {
        let path = path.into();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                TrackerError::Storage(format!(
                    "Failed to create storage directory {}: {}",
                    parent.display(),
                    e
                ))
            })?;
        }
        Ok(Self {
            path,
            write_lock: Mutex::new(()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> TrackerResult<HashMap<String, String>> {
        if !self.path.exists() {
            return Ok(HashMap::new());
        }
        let content = std::fs::read_to_string(&self.path).map_err(|e| {
            TrackerError::Storage(format!("Failed to read {}: {}", self.path.display(), e))
        })?;
        if content.trim().is_empty() {
            return Ok(HashMap::new());
        }
        Ok(serde_json::from_str(&content)?)
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> TrackerResult<Option<String>> {
        Ok(self.load()?.remove(key))
    }

    fn set(&self, key: &str, value: &str) -> TrackerResult<()> {
        let _guard = self.write_lock.lock();

        let mut values = match self.load() {
            Ok(values) => values,
            Err(TrackerError::Serialization(e)) => {
                warn!(path = %self.path.display(), error = %e, "replacing unreadable store file");
                HashMap::new()
            }
            Err(e) => return Err(e),
        };
        values.insert(key.to_string(), value.to_string());

        let tmp = self.path.with_extension("tmp");
        let content = serde_json::to_string_pretty(&values)?;
        std::fs::write(&tmp, content).map_err(|e| {
            TrackerError::Storage(format!("Failed to write {}: {}", tmp.display(), e))
        })?;
        std::fs::rename(&tmp, &self.path).map_err(|e| {
            TrackerError::Storage(format!("Failed to replace {}: {}", self.path.display(), e))
        })?;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "file"
    }
}

/// Store that remembers nothing
#[derive(Debug, Default, Clone)]
pub struct NullStore;

impl NullStore {
    pub fn new() -> Self {
        Self
    }
}

impl KeyValueStore for NullStore {
    fn get(&self, _key: &str) -> TrackerResult<Option<String>> {
        Ok(None)
    }

    fn set(&self, _key: &str, _value: &str) -> TrackerResult<()> {
        Ok(())
    }

    fn name(&self) -> &'static str {
        "null"
    }
}
