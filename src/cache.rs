//! Two-tier fragment cache.
//!
//! Site-wide fragments (header, footer) rarely change, so fetching them once
//! per page is wasted work. The cache keeps fetched fragment HTML keyed by
//! component name in two tiers:
//!
//! | Tier | Type | Lifetime | Validity |
//! |------|------|----------|----------|
//! | memory | [`MemoryCache`] | process | always valid |
//! | persistent | [`PersistentCache`] | survives restarts | `age < duration` |
//!
//! [`TieredCache`] composes them. Reads check memory first, then the
//! persistent tier; a valid persistent hit is promoted into memory. Writes go
//! to both tiers with the current timestamp. The persistent duration bounds
//! staleness: a redeployed header shows up within one duration.
//!
//! ## Persistent entries
//!
//! Entries are stored through a [`Storage`] under `"{prefix}{name}"` as JSON:
//!
//! ```json
//! {"html": "<header>...</header>", "timestamp": 1760486400000}
//! ```
//!
//! An entry whose age has reached the duration is removed on read and
//! reported as a miss. An entry that does not parse is removed the same way.
//! Storage failures are logged and never surface to callers: a broken cache
//! only costs a fetch.

use crate::clock::Clock;
use crate::storage::{Storage, StorageError, lock};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::debug;

/// Default key namespace for persistent entries.
pub const DEFAULT_PREFIX: &str = "inflapy_component_";

/// Default lifetime of a persistent entry: one hour.
pub const DEFAULT_DURATION: Duration = Duration::from_secs(60 * 60);

/// A store of fragment HTML keyed by component name.
///
/// Implementations use interior mutability so one cache can be shared by
/// every concurrent load.
pub trait FragmentCache: Send + Sync {
    fn get(&self, name: &str) -> Option<String>;
    fn set(&self, name: &str, html: &str);
    fn clear(&self);
}

/// Process-lifetime tier. Entries never expire.
#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        lock(&self.entries).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl FragmentCache for MemoryCache {
    fn get(&self, name: &str) -> Option<String> {
        lock(&self.entries).get(name).cloned()
    }

    fn set(&self, name: &str, html: &str) {
        lock(&self.entries).insert(name.to_string(), html.to_string());
    }

    fn clear(&self) {
        lock(&self.entries).clear();
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct StoredEntry {
    html: String,
    /// Milliseconds since the Unix epoch.
    timestamp: i64,
}

/// Time-boxed tier over a [`Storage`].
pub struct PersistentCache {
    storage: Arc<dyn Storage>,
    prefix: String,
    duration: Duration,
    clock: Arc<dyn Clock>,
}

impl PersistentCache {
    pub fn new(
        storage: Arc<dyn Storage>,
        prefix: impl Into<String>,
        duration: Duration,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            storage,
            prefix: prefix.into(),
            duration,
            clock,
        }
    }

    pub fn key(&self, name: &str) -> String {
        format!("{}{}", self.prefix, name)
    }

    fn discard(&self, key: &str) {
        if let Err(e) = self.storage.remove_item(key) {
            debug!(key, error = %e, "cache remove error");
        }
    }
}

impl FragmentCache for PersistentCache {
    fn get(&self, name: &str) -> Option<String> {
        let key = self.key(name);
        let raw = match self.storage.get_item(&key) {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                debug!(component = name, error = %e, "cache read error");
                return None;
            }
        };

        let entry: StoredEntry = match serde_json::from_str(&raw) {
            Ok(entry) => entry,
            Err(e) => {
                debug!(component = name, error = %e, "discarding malformed cache entry");
                self.discard(&key);
                return None;
            }
        };

        let age = self.clock.now_millis().saturating_sub(entry.timestamp);
        let max_age = i64::try_from(self.duration.as_millis()).unwrap_or(i64::MAX);
        if age < max_age {
            Some(entry.html)
        } else {
            debug!(component = name, age_ms = age, "cache expired");
            self.discard(&key);
            None
        }
    }

    fn set(&self, name: &str, html: &str) {
        let entry = StoredEntry {
            html: html.to_string(),
            timestamp: self.clock.now_millis(),
        };
        let result = serde_json::to_string(&entry)
            .map_err(StorageError::from)
            .and_then(|json| self.storage.set_item(&self.key(name), json));
        if let Err(e) = result {
            debug!(component = name, error = %e, "cache write error");
        }
    }

    /// Remove every entry under this cache's prefix. Other keys are untouched.
    fn clear(&self) {
        let keys = match self.storage.keys() {
            Ok(keys) => keys,
            Err(e) => {
                debug!(error = %e, "cache clear error");
                return;
            }
        };
        for key in keys.iter().filter(|k| k.starts_with(&self.prefix)) {
            self.discard(key);
        }
    }
}

/// Memory tier in front of a persistent tier.
pub struct TieredCache<M = MemoryCache, P = PersistentCache> {
    memory: M,
    persistent: P,
}

impl<M: FragmentCache, P: FragmentCache> TieredCache<M, P> {
    pub fn new(memory: M, persistent: P) -> Self {
        Self { memory, persistent }
    }

    pub fn memory(&self) -> &M {
        &self.memory
    }

    pub fn persistent(&self) -> &P {
        &self.persistent
    }
}

impl<M: FragmentCache, P: FragmentCache> FragmentCache for TieredCache<M, P> {
    fn get(&self, name: &str) -> Option<String> {
        if let Some(html) = self.memory.get(name) {
            debug!(component = name, "cache hit (memory)");
            return Some(html);
        }
        let html = self.persistent.get(name)?;
        debug!(component = name, "cache hit (persistent)");
        self.memory.set(name, &html);
        Some(html)
    }

    fn set(&self, name: &str, html: &str) {
        self.memory.set(name, html);
        self.persistent.set(name, html);
    }

    fn clear(&self) {
        self.memory.clear();
        self.persistent.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;
    use crate::test_helpers::{CountingStorage, ManualClock};

    fn persistent(storage: Arc<dyn Storage>, clock: Arc<ManualClock>) -> PersistentCache {
        PersistentCache::new(storage, DEFAULT_PREFIX, DEFAULT_DURATION, clock)
    }

    // =========================================================================
    // MemoryCache
    // =========================================================================

    #[test]
    fn memory_cache_set_get_clear() {
        let cache = MemoryCache::new();
        assert_eq!(cache.get("header"), None);
        cache.set("header", "<header></header>");
        assert_eq!(cache.get("header").as_deref(), Some("<header></header>"));
        cache.clear();
        assert!(cache.is_empty());
    }

    // =========================================================================
    // PersistentCache
    // =========================================================================

    #[test]
    fn persistent_entry_is_namespaced_json() {
        let storage = Arc::new(MemoryStorage::new());
        let clock = ManualClock::new();
        let cache = persistent(storage.clone(), clock.clone());
        cache.set("footer", "<footer>x</footer>");

        let raw = storage
            .get_item("inflapy_component_footer")
            .unwrap()
            .unwrap();
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(value["html"], "<footer>x</footer>");
        assert_eq!(value["timestamp"], clock.now_millis());
    }

    #[test]
    fn persistent_entry_valid_until_duration() {
        let storage = Arc::new(MemoryStorage::new());
        let clock = ManualClock::new();
        let cache = persistent(storage, clock.clone());
        cache.set("header", "<h>");

        clock.advance(chrono::Duration::minutes(59));
        assert_eq!(cache.get("header").as_deref(), Some("<h>"));
    }

    #[test]
    fn expired_entry_is_evicted_on_read() {
        let storage = Arc::new(MemoryStorage::new());
        let clock = ManualClock::new();
        let cache = persistent(storage.clone(), clock.clone());
        cache.set("header", "<h>");

        clock.advance(chrono::Duration::hours(1));
        assert_eq!(cache.get("header"), None);
        assert_eq!(storage.get_item("inflapy_component_header").unwrap(), None);
    }

    #[test]
    fn malformed_entry_is_discarded() {
        let storage = Arc::new(MemoryStorage::new());
        storage
            .set_item("inflapy_component_header", "{not json".into())
            .unwrap();
        let cache = persistent(storage.clone(), ManualClock::new());

        assert_eq!(cache.get("header"), None);
        assert!(storage.keys().unwrap().is_empty());
    }

    #[test]
    fn clear_only_removes_prefixed_keys() {
        let storage = Arc::new(MemoryStorage::new());
        storage.set_item("theme", "dark".into()).unwrap();
        let cache = persistent(storage.clone(), ManualClock::new());
        cache.set("header", "<h>");
        cache.set("footer", "<f>");

        cache.clear();
        assert_eq!(storage.keys().unwrap(), vec!["theme"]);
    }

    // =========================================================================
    // TieredCache
    // =========================================================================

    #[test]
    fn tiered_set_writes_both_tiers() {
        let storage = Arc::new(CountingStorage::new());
        let cache = TieredCache::new(
            MemoryCache::new(),
            persistent(storage.clone(), ManualClock::new()),
        );
        cache.set("header", "<h>");
        assert_eq!(cache.memory().get("header").as_deref(), Some("<h>"));
        assert_eq!(storage.writes(), 1);
    }

    #[test]
    fn persistent_hit_is_promoted_to_memory() {
        let storage: Arc<dyn Storage> = Arc::new(MemoryStorage::new());
        let clock = ManualClock::new();
        // Simulates an entry written by a previous process.
        persistent(storage.clone(), clock.clone()).set("footer", "<f>");

        let cache = TieredCache::new(MemoryCache::new(), persistent(storage, clock));
        assert!(cache.memory().is_empty());
        assert_eq!(cache.get("footer").as_deref(), Some("<f>"));
        assert_eq!(cache.memory().get("footer").as_deref(), Some("<f>"));
    }

    #[test]
    fn memory_tier_outlives_persistent_expiry() {
        let storage = Arc::new(MemoryStorage::new());
        let clock = ManualClock::new();
        let cache = TieredCache::new(MemoryCache::new(), persistent(storage, clock.clone()));
        cache.set("header", "<h>");

        clock.advance(chrono::Duration::hours(3));
        assert_eq!(cache.get("header").as_deref(), Some("<h>"));
        assert_eq!(cache.persistent().get("header"), None);
    }

    #[test]
    fn tiered_clear_empties_both_tiers() {
        let storage = Arc::new(MemoryStorage::new());
        let cache = TieredCache::new(
            MemoryCache::new(),
            persistent(storage.clone(), ManualClock::new()),
        );
        cache.set("header", "<h>");
        cache.clear();
        assert_eq!(cache.get("header"), None);
        assert!(storage.keys().unwrap().is_empty());
    }
}
