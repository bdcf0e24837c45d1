//! Key-value stores backing the persistent cache tier.
//!
//! [`Storage`] is a string-to-string store in the shape of browser
//! `localStorage`: values are opaque strings and callers do their own
//! encoding. Two backends:
//!
//! - [`FileStorage`]: a JSON file (`.component-cache.json`) inside a cache
//!   directory. Survives process restarts.
//! - [`MemoryStorage`]: a map behind a mutex. Lives as long as the process.
//!
//! ## File format
//!
//! ```json
//! {
//!   "version": 1,
//!   "items": {
//!     "inflapy_component_header": "{\"html\":\"<header>...</header>\",\"timestamp\":1760486400000}"
//!   }
//! }
//! ```
//!
//! A file that is missing, unparseable, or carries another `version` loads as
//! an empty store; the next write replaces it.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};
use thiserror::Error;

/// Name of the store file within the cache directory.
const STORE_FILENAME: &str = ".component-cache.json";

/// Bump to discard every existing store when the format changes.
const STORE_VERSION: u32 = 1;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub trait Storage: Send + Sync {
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError>;
    fn set_item(&self, key: &str, value: String) -> Result<(), StorageError>;
    fn remove_item(&self, key: &str) -> Result<(), StorageError>;
    fn keys(&self) -> Result<Vec<String>, StorageError>;
}

pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Debug, Default)]
pub struct MemoryStorage {
    items: Mutex<BTreeMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Storage for MemoryStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(lock(&self.items).get(key).cloned())
    }

    fn set_item(&self, key: &str, value: String) -> Result<(), StorageError> {
        lock(&self.items).insert(key.to_string(), value);
        Ok(())
    }

    fn remove_item(&self, key: &str) -> Result<(), StorageError> {
        lock(&self.items).remove(key);
        Ok(())
    }

    fn keys(&self) -> Result<Vec<String>, StorageError> {
        Ok(lock(&self.items).keys().cloned().collect())
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct StoreFile {
    version: u32,
    items: BTreeMap<String, String>,
}

/// A JSON-file store, read once on open and rewritten on every change.
#[derive(Debug)]
pub struct FileStorage {
    path: PathBuf,
    items: Mutex<BTreeMap<String, String>>,
}

impl FileStorage {
    /// Open the store in `dir`. Missing or unreadable files yield an empty store.
    pub fn open(dir: &Path) -> Self {
        let path = dir.join(STORE_FILENAME);
        let items = std::fs::read_to_string(&path)
            .ok()
            .and_then(|content| serde_json::from_str::<StoreFile>(&content).ok())
            .filter(|file| file.version == STORE_VERSION)
            .map(|file| file.items)
            .unwrap_or_default();
        Self {
            path,
            items: Mutex::new(items),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn save(&self, items: &BTreeMap<String, String>) -> Result<(), StorageError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = StoreFile {
            version: STORE_VERSION,
            items: items.clone(),
        };
        std::fs::write(&self.path, serde_json::to_string_pretty(&file)?)?;
        Ok(())
    }
}

impl Storage for FileStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(lock(&self.items).get(key).cloned())
    }

    /// The in-memory map changes only once the file write succeeds.
    fn set_item(&self, key: &str, value: String) -> Result<(), StorageError> {
        let mut items = lock(&self.items);
        let mut next = items.clone();
        next.insert(key.to_string(), value);
        self.save(&next)?;
        *items = next;
        Ok(())
    }

    fn remove_item(&self, key: &str) -> Result<(), StorageError> {
        let mut items = lock(&self.items);
        if !items.contains_key(key) {
            return Ok(());
        }
        let mut next = items.clone();
        next.remove(key);
        self.save(&next)?;
        *items = next;
        Ok(())
    }

    fn keys(&self) -> Result<Vec<String>, StorageError> {
        Ok(lock(&self.items).keys().cloned().collect())
    }
}

/// Resolve the store file path for a cache directory.
pub fn store_path(cache_dir: &Path) -> PathBuf {
    cache_dir.join(STORE_FILENAME)
}
