//! Cache Statistics Module
//!
//! Tracks process-wide counters and builds the on-demand statistics report.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::cache::NamespacePolicy;

// == Cache Stats ==
/// Running counters shared by every namespace.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStats {
    /// Successful reads
    pub hits: u64,
    /// Reads that found nothing valid (absent, expired, unknown namespace)
    pub misses: u64,
    /// Entries removed to make room for an insertion
    pub evictions: u64,
    /// Entries removed because their TTL elapsed
    pub expirations: u64,
    /// Every `get` call
    pub total_requests: u64,
    /// Entries stored in envelope form
    pub compressions: u64,
}

impl CacheStats {
    // == Constructor ==
    /// Creates a new CacheStats with all counters at zero.
    pub fn new() -> Self {
        Self::default()
    }

    // == Efficiency ==
    /// Hit percentage over all requests, or 0.0 before the first request.
    pub fn cache_efficiency(&self) -> f64 {
        if self.total_requests == 0 {
            0.0
        } else {
            self.hits as f64 / self.total_requests as f64 * 100.0
        }
    }

    pub fn record_hit(&mut self) {
        self.hits += 1;
        self.total_requests += 1;
    }

    pub fn record_miss(&mut self) {
        self.misses += 1;
        self.total_requests += 1;
    }

    pub fn record_eviction(&mut self) {
        self.evictions += 1;
    }

    pub fn record_expirations(&mut self, count: u64) {
        self.expirations += count;
    }

    pub fn record_compression(&mut self) {
        self.compressions += 1;
    }
}

// == Namespace Report ==
/// Per-namespace slice of the statistics report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NamespaceReport {
    pub size: usize,
    pub max_size: usize,
    pub policy: NamespacePolicy,
}

// == Statistics Report ==
/// Snapshot combining counters with derived figures.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatisticsReport {
    #[serde(flatten)]
    pub counters: CacheStats,
    /// `hits / totalRequests * 100`
    pub cache_efficiency: f64,
    /// Sum of `sizeBytes` over every live entry
    pub memory_usage: usize,
    pub last_cleanup_at: Option<DateTime<Utc>>,
    pub namespaces: BTreeMap<String, NamespaceReport>,
}
