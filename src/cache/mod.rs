//! Cache Module
//!
//! Provides the namespaced memoization cache: TTL expiry, approximate-LRU
//! eviction, statistics, and durable snapshots of persistent namespaces.

mod entry;
mod key;
mod namespace;
pub mod persistence;
mod stats;
mod store;


// Re-export public types
pub use entry::{current_timestamp_ms, decode, encode, CacheEntry, EncodedValue};
pub use key::{canonical_json, derive_key, rolling_hash};
pub use namespace::{Namespace, NamespacePolicy};
pub use persistence::{DurableStore, FileStore, MemoryStore, NamespaceSnapshot};
pub use stats::{CacheStats, NamespaceReport, StatisticsReport};
pub use store::{CacheExport, NamespacedCache, SweepOutcome};

/// Handle shared between the HTTP layer and background tasks.
pub type SharedCache = std::sync::Arc<tokio::sync::RwLock<NamespacedCache>>;
