//! Shared fakes for the unit test suite.
//!
//! ```rust
//! use crate::test_helpers::*;
//!
//! let source = MockSource::new().with_fragment("/components/header.html", "<header></header>");
//! let clock = ManualClock::new();
//! let loader = ComponentLoader::new(source.clone(), &SiteConfig::default())
//!     .with_clock(clock.clone())
//!     .with_storage(Arc::new(CountingStorage::new()));
//! ```

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::Receiver;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, TimeZone, Utc};

use crate::clock::Clock;
use crate::components::LoaderEvent;
use crate::source::{FetchError, FragmentSource};
use crate::storage::{MemoryStorage, Storage, StorageError, lock};

// =========================================================================
// Fragment source
// =========================================================================

/// In-memory fragment source that records every fetch.
///
/// Paths without a fragment fail with `HTTP 404: Not Found`.
#[derive(Default)]
pub struct MockSource {
    fragments: Mutex<HashMap<String, String>>,
    fetches: Mutex<Vec<String>>,
}

impl MockSource {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn with_fragment(self: Arc<Self>, path: &str, html: &str) -> Arc<Self> {
        self.insert(path, html);
        self
    }

    pub fn insert(&self, path: &str, html: &str) {
        lock(&self.fragments).insert(path.to_string(), html.to_string());
    }

    /// Paths fetched so far, in call order.
    pub fn fetched(&self) -> Vec<String> {
        lock(&self.fetches).clone()
    }
}

impl FragmentSource for MockSource {
    fn fetch(&self, path: &str) -> Result<String, FetchError> {
        lock(&self.fetches).push(path.to_string());
        lock(&self.fragments)
            .get(path)
            .cloned()
            .ok_or_else(FetchError::not_found)
    }
}

// =========================================================================
// Clock
// =========================================================================

/// A clock that only moves when told to. Starts at 2026-10-15T12:00:00Z.
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            now: Mutex::new(Utc.with_ymd_and_hms(2026, 10, 15, 12, 0, 0).unwrap()),
        })
    }

    pub fn advance(&self, by: chrono::Duration) {
        *lock(&self.now) += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *lock(&self.now)
    }
}

// =========================================================================
// Storage
// =========================================================================

/// [`MemoryStorage`] that counts `set_item` calls.
#[derive(Default)]
pub struct CountingStorage {
    inner: MemoryStorage,
    writes: AtomicUsize,
}

impl CountingStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }
}

impl Storage for CountingStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
        self.inner.get_item(key)
    }

    fn set_item(&self, key: &str, value: String) -> Result<(), StorageError> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.inner.set_item(key, value)
    }

    fn remove_item(&self, key: &str) -> Result<(), StorageError> {
        self.inner.remove_item(key)
    }

    fn keys(&self) -> Result<Vec<String>, StorageError> {
        self.inner.keys()
    }
}

// =========================================================================
// Events
// =========================================================================

/// Every event sent so far, in order.
pub fn drain_events(rx: Receiver<LoaderEvent>) -> Vec<LoaderEvent> {
    rx.try_iter().collect()
}
