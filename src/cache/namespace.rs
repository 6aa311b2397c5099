//! Namespace Module
//!
//! One independently policed partition of the cache: its entry map, its
//! TTL/capacity policy, and the approximate-LRU victim selection.

use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::cache::entry::duration_to_ms;
use crate::cache::CacheEntry;

// == Namespace Policy ==
/// Expiry and capacity policy, fixed at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NamespacePolicy {
    /// Default TTL in milliseconds
    pub ttl_ms: u64,
    /// Maximum number of entries
    pub max_size: usize,
}

impl NamespacePolicy {
    pub fn new(ttl: Duration, max_size: usize) -> Self {
        Self {
            ttl_ms: duration_to_ms(ttl),
            max_size: max_size.max(1),
        }
    }

    pub fn ttl(&self) -> Duration {
        Duration::from_millis(self.ttl_ms)
    }
}

// == Namespace ==
#[derive(Debug)]
pub struct Namespace {
    policy: NamespacePolicy,
    persistent: bool,
    entries: HashMap<String, CacheEntry>,
}

impl Namespace {
    pub fn new(policy: NamespacePolicy, persistent: bool) -> Self {
        Self {
            policy,
            persistent,
            entries: HashMap::new(),
        }
    }

    pub fn policy(&self) -> NamespacePolicy {
        self.policy
    }

    pub fn is_persistent(&self) -> bool {
        self.persistent
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.entries.len() >= self.policy.max_size
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn entry_mut(&mut self, key: &str) -> Option<&mut CacheEntry> {
        self.entries.get_mut(key)
    }

    pub fn insert(&mut self, key: String, entry: CacheEntry) {
        self.entries.insert(key, entry);
    }

    pub fn remove(&mut self, key: &str) -> Option<CacheEntry> {
        self.entries.remove(key)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn entries(&self) -> impl Iterator<Item = (&String, &CacheEntry)> {
        self.entries.iter()
    }

    pub fn memory_usage(&self) -> usize {
        self.entries.values().map(|e| e.size_bytes).sum()
    }

    // == Eviction ==
    /// Key with the smallest synthetic last-access time.
    ///
    /// Ties resolve to whichever candidate the map yields first.
    pub fn eviction_candidate(&self) -> Option<String> {
        self.entries
            .iter()
            .min_by_key(|(_, entry)| entry.synthetic_last_access())
            .map(|(key, _)| key.clone())
    }

    /// Removes the approximate-LRU victim, returning its key.
    pub fn evict_one(&mut self) -> Option<String> {
        let victim = self.eviction_candidate()?;
        self.entries.remove(&victim);
        Some(victim)
    }

    // == Expiry Sweep ==
    /// Drops every entry no longer valid at `now`; returns how many went.
    pub fn purge_expired(&mut self, now: u64) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.is_valid_at(now));
        before - self.entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn entry_at(created_at: u64, hits: u64, ttl_ms: u64) -> CacheEntry {
        let mut entry =
            CacheEntry::with_created_at(json!(created_at), Duration::from_millis(ttl_ms), false, created_at);
        entry.hit_count = hits;
        entry
    }

    #[test]
    fn test_policy_clamps_capacity() {
        let policy = NamespacePolicy::new(Duration::from_secs(1), 0);
        assert_eq!(policy.max_size, 1);
        assert_eq!(policy.ttl(), Duration::from_secs(1));
    }

    #[test]
    fn test_eviction_prefers_oldest_synthetic_access() {
        let mut ns = Namespace::new(NamespacePolicy::new(Duration::from_secs(60), 3), false);
        ns.insert("old".into(), entry_at(1_000, 0, 60_000));
        ns.insert("newer".into(), entry_at(1_500, 0, 60_000));
        ns.insert("popular".into(), entry_at(500, 2, 60_000));

        // popular: 500 + 2000 = 2500, old: 1000, newer: 1500
        assert_eq!(ns.eviction_candidate(), Some("old".to_string()));
        assert_eq!(ns.evict_one(), Some("old".to_string()));
        assert_eq!(ns.evict_one(), Some("newer".to_string()));
        assert_eq!(ns.evict_one(), Some("popular".to_string()));
        assert_eq!(ns.evict_one(), None);
    }

    #[test]
    fn test_hits_outweigh_age() {
        let mut ns = Namespace::new(NamespacePolicy::new(Duration::from_secs(60), 2), false);
        ns.insert("a".into(), entry_at(10_000, 1, 60_000));
        ns.insert("b".into(), entry_at(10_500, 0, 60_000));

        // a: 11_000 vs b: 10_500
        assert_eq!(ns.eviction_candidate(), Some("b".to_string()));
    }

    #[test]
    fn test_purge_expired() {
        let mut ns = Namespace::new(NamespacePolicy::new(Duration::from_secs(60), 10), false);
        ns.insert("short".into(), entry_at(1_000, 0, 100));
        ns.insert("long".into(), entry_at(1_000, 0, 10_000));

        assert_eq!(ns.purge_expired(1_099), 0);
        assert_eq!(ns.purge_expired(1_100), 1);
        assert!(ns.contains("long"));
        assert!(!ns.contains("short"));
    }

    #[test]
    fn test_memory_usage_sums_entries() {
        let mut ns = Namespace::new(NamespacePolicy::new(Duration::from_secs(60), 10), false);
        ns.insert("a".into(), entry_at(1, 0, 1_000)); // "1"
        ns.insert("b".into(), entry_at(100, 0, 1_000)); // "100"
        assert_eq!(ns.memory_usage(), 4);
        assert!(!ns.is_full());
    }
}
