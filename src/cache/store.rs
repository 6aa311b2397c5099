//! Cache Store Module
//!
//! The namespaced cache engine: per-namespace TTL and capacity policies,
//! approximate-LRU eviction, process-wide statistics, and snapshot hooks for
//! persistent namespaces.
//!
//! Every operation is best-effort. Unknown namespaces, encode failures and
//! storage problems degrade to a miss or a no-op; nothing here returns an
//! error to the caller.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::cache::entry::current_timestamp_ms;
use crate::cache::persistence::{
    encode_payload, load_namespace, write_snapshots, DurableStore, MemoryStore, NamespaceSnapshot,
};
use crate::cache::{
    derive_key, CacheEntry, CacheStats, Namespace, NamespacePolicy, NamespaceReport,
    StatisticsReport,
};
use crate::config::CacheConfig;

// == Export Payload ==
/// Every namespace's entries plus a statistics snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheExport {
    pub namespaces: BTreeMap<String, Vec<(String, CacheEntry)>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub statistics: Option<StatisticsReport>,
}

/// Result of one sweep pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SweepOutcome {
    pub removed: usize,
}

// == Namespaced Cache ==
#[derive(Debug)]
pub struct NamespacedCache {
    namespaces: HashMap<String, Namespace>,
    stats: CacheStats,
    compression_enabled: bool,
    statistics_enabled: bool,
    last_cleanup_at: Option<DateTime<Utc>>,
    storage: Arc<dyn DurableStore>,
    /// Held from snapshot until write so saves land in snapshot order.
    save_gate: Arc<tokio::sync::Mutex<()>>,
}

impl NamespacedCache {
    // == Constructor ==
    /// Builds the fixed namespace set from `config`, backed by `storage`.
    ///
    /// Persistent namespaces are not loaded until [`NamespacedCache::init`].
    pub fn new(config: &CacheConfig, storage: Arc<dyn DurableStore>) -> Self {
        let namespaces = config
            .namespaces
            .iter()
            .map(|ns| {
                let (ttl, max_size) = config.resolve(ns);
                let persistent = config.persistent_namespaces.contains(&ns.name);
                (
                    ns.name.clone(),
                    Namespace::new(NamespacePolicy::new(ttl, max_size), persistent),
                )
            })
            .collect();

        Self {
            namespaces,
            stats: CacheStats::new(),
            compression_enabled: config.compression_enabled,
            statistics_enabled: config.statistics_enabled,
            last_cleanup_at: None,
            storage,
            save_gate: Arc::new(tokio::sync::Mutex::new(())),
        }
    }

    /// A cache whose durable store lives only as long as the process.
    pub fn in_memory(config: &CacheConfig) -> Self {
        Self::new(config, Arc::new(MemoryStore::new()))
    }

    // == Init ==
    /// Loads persistent namespaces from durable storage.
    ///
    /// Expired entries are dropped; if a snapshot holds more entries than
    /// the namespace allows, the usual eviction policy trims it. Returns the
    /// number of entries restored.
    pub fn init(&mut self) -> usize {
        let now = current_timestamp_ms();
        let mut restored = 0;

        for (name, namespace) in self.namespaces.iter_mut() {
            if !namespace.is_persistent() {
                continue;
            }

            namespace.clear();
            for (key, entry) in load_namespace(self.storage.as_ref(), name) {
                if entry.is_valid_at(now) {
                    namespace.insert(key, entry);
                }
            }
            while namespace.len() > namespace.policy().max_size {
                namespace.evict_one();
            }

            restored += namespace.len();
            debug!(namespace = %name, entries = namespace.len(), "Namespace restored");
        }

        info!(restored, "Persistent namespaces loaded");
        restored
    }

    pub fn has_namespace(&self, namespace: &str) -> bool {
        self.namespaces.contains_key(namespace)
    }

    pub fn namespace_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.namespaces.keys().cloned().collect();
        names.sort();
        names
    }

    /// Number of entries held by a namespace, `None` if unknown.
    pub fn len(&self, namespace: &str) -> Option<usize> {
        self.namespaces.get(namespace).map(Namespace::len)
    }

    pub fn storage(&self) -> Arc<dyn DurableStore> {
        Arc::clone(&self.storage)
    }

    /// Lock that orders background saves against each other.
    pub fn save_gate(&self) -> Arc<tokio::sync::Mutex<()>> {
        Arc::clone(&self.save_gate)
    }

    // == Get ==
    /// Looks up a value.
    ///
    /// Unknown namespaces, absent keys and expired entries are all misses;
    /// an expired entry is dropped on the spot.
    pub fn get(&mut self, namespace: &str, key: &Value) -> Option<Value> {
        let Some(ns) = self.namespaces.get_mut(namespace) else {
            warn!(namespace, "get on unknown namespace");
            self.record_miss();
            return None;
        };

        let cache_key = derive_key(key);
        let now = current_timestamp_ms();

        let (value, expired) = match ns.entry_mut(&cache_key) {
            Some(entry) if entry.is_valid_at(now) => {
                entry.record_hit();
                (Some(entry.decoded_value()), false)
            }
            Some(_) => (None, true),
            None => (None, false),
        };

        if expired {
            ns.remove(&cache_key);
            if self.statistics_enabled {
                self.stats.record_expirations(1);
            }
            debug!(namespace, key = %cache_key, "Entry expired on access");
        }

        match value {
            Some(value) => {
                if self.statistics_enabled {
                    self.stats.record_hit();
                }
                Some(value)
            }
            None => {
                self.record_miss();
                None
            }
        }
    }

    /// Like [`NamespacedCache::get`] but falls back to `default`.
    pub fn get_or(&mut self, namespace: &str, key: &Value, default: Value) -> Value {
        self.get(namespace, key).unwrap_or(default)
    }

    /// Typed lookup. A stored value that does not fit `T` is a miss for the caller.
    pub fn get_as<T: DeserializeOwned>(&mut self, namespace: &str, key: &Value) -> Option<T> {
        let value = self.get(namespace, key)?;
        match serde_json::from_value(value) {
            Ok(typed) => Some(typed),
            Err(err) => {
                warn!(namespace, error = %err, "Cached value has unexpected shape");
                None
            }
        }
    }

    // == Set ==
    /// Stores a value. Returns false only when the namespace is unknown.
    ///
    /// Inserting a new key into a full namespace evicts first, so the
    /// namespace never exceeds its capacity once this returns.
    pub fn set(&mut self, namespace: &str, key: &Value, value: Value, ttl: Option<Duration>) -> bool {
        let Some(ns) = self.namespaces.get_mut(namespace) else {
            warn!(namespace, "set on unknown namespace");
            return false;
        };

        let cache_key = derive_key(key);
        let ttl = ttl.unwrap_or_else(|| ns.policy().ttl());
        let entry = CacheEntry::new(value, ttl, self.compression_enabled);

        if !ns.contains(&cache_key) && ns.is_full() {
            if let Some(victim) = ns.evict_one() {
                debug!(namespace, key = %victim, "Evicted entry to make room");
                if self.statistics_enabled {
                    self.stats.record_eviction();
                }
            }
        }

        if entry.compressed && self.statistics_enabled {
            self.stats.record_compression();
        }
        ns.insert(cache_key, entry);
        true
    }

    /// Typed store. Values that cannot be represented as JSON are not cached.
    pub fn set_as<T: Serialize>(
        &mut self,
        namespace: &str,
        key: &Value,
        value: &T,
        ttl: Option<Duration>,
    ) -> bool {
        match serde_json::to_value(value) {
            Ok(value) => self.set(namespace, key, value, ttl),
            Err(err) => {
                warn!(namespace, error = %err, "Value not serializable, skipping cache");
                false
            }
        }
    }

    // == Remove ==
    pub fn remove(&mut self, namespace: &str, key: &Value) -> bool {
        match self.namespaces.get_mut(namespace) {
            Some(ns) => ns.remove(&derive_key(key)).is_some(),
            None => {
                warn!(namespace, "remove on unknown namespace");
                false
            }
        }
    }

    // == Clear ==
    /// Clears one namespace, or every namespace when `namespace` is `None`.
    pub fn clear(&mut self, namespace: Option<&str>) {
        match namespace {
            Some(name) => match self.namespaces.get_mut(name) {
                Some(ns) => ns.clear(),
                None => warn!(namespace = name, "clear on unknown namespace"),
            },
            None => self.namespaces.values_mut().for_each(Namespace::clear),
        }
    }

    // == Sweep ==
    /// Removes every expired entry in every namespace.
    pub fn sweep(&mut self) -> SweepOutcome {
        self.sweep_at(current_timestamp_ms())
    }

    pub(crate) fn sweep_at(&mut self, now: u64) -> SweepOutcome {
        let removed: usize = self
            .namespaces
            .values_mut()
            .map(|ns| ns.purge_expired(now))
            .sum();

        if self.statistics_enabled {
            self.stats.record_expirations(removed as u64);
        }
        self.last_cleanup_at = Some(Utc::now());

        SweepOutcome { removed }
    }

    // == Persistence ==
    /// Serializes every persistent namespace.
    ///
    /// Meant to be called under the cache lock; the write itself happens in
    /// [`write_snapshots`] once the lock is released.
    pub fn snapshot_persistent(&self) -> Vec<NamespaceSnapshot> {
        self.namespaces
            .iter()
            .filter(|(_, ns)| ns.is_persistent())
            .filter_map(|(name, ns)| match encode_payload(ns.entries()) {
                Ok(payload) => Some(NamespaceSnapshot {
                    namespace: name.clone(),
                    payload,
                }),
                Err(err) => {
                    warn!(namespace = %name, error = %err, "Failed to serialize namespace, skipping");
                    None
                }
            })
            .collect()
    }

    /// Snapshots and writes persistent namespaces synchronously.
    ///
    /// Returns the number of namespaces saved.
    pub fn flush(&self) -> usize {
        write_snapshots(self.storage.as_ref(), &self.snapshot_persistent())
    }

    // == Statistics ==
    pub fn stats(&self) -> &CacheStats {
        &self.stats
    }

    pub fn reset_statistics(&mut self) {
        self.stats = CacheStats::new();
    }

    /// Builds a full report. Memory usage is recomputed every call.
    pub fn statistics(&self) -> StatisticsReport {
        let namespaces = self
            .namespaces
            .iter()
            .map(|(name, ns)| {
                (
                    name.clone(),
                    NamespaceReport {
                        size: ns.len(),
                        max_size: ns.policy().max_size,
                        policy: ns.policy(),
                    },
                )
            })
            .collect();

        StatisticsReport {
            counters: self.stats.clone(),
            cache_efficiency: self.stats.cache_efficiency(),
            memory_usage: self.namespaces.values().map(Namespace::memory_usage).sum(),
            last_cleanup_at: self.last_cleanup_at,
            namespaces,
        }
    }

    // == Export / Import ==
    pub fn export_all(&self) -> CacheExport {
        let namespaces = self
            .namespaces
            .iter()
            .map(|(name, ns)| {
                let mut entries: Vec<(String, CacheEntry)> = ns
                    .entries()
                    .map(|(key, entry)| (key.clone(), entry.clone()))
                    .collect();
                entries.sort_by(|a, b| a.0.cmp(&b.0));
                (name.clone(), entries)
            })
            .collect();

        CacheExport {
            namespaces,
            statistics: Some(self.statistics()),
        }
    }

    /// Replaces each namespace named in `data` with its still-valid entries.
    ///
    /// Namespaces absent from `data` are untouched; unknown ones are ignored.
    /// Returns the number of entries accepted.
    pub fn import_all(&mut self, data: CacheExport) -> usize {
        let now = current_timestamp_ms();
        let mut accepted = 0;

        for (name, entries) in data.namespaces {
            let Some(ns) = self.namespaces.get_mut(&name) else {
                warn!(namespace = %name, "Import skipped unknown namespace");
                continue;
            };

            ns.clear();
            for (key, entry) in entries {
                if entry.is_valid_at(now) {
                    ns.insert(key, entry);
                }
            }
            while ns.len() > ns.policy().max_size {
                ns.evict_one();
            }
            accepted += ns.len();
        }

        info!(accepted, "Cache import complete");
        accepted
    }

    fn record_miss(&mut self) {
        if self.statistics_enabled {
            self.stats.record_miss();
        }
    }
}
