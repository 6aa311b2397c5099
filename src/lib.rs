//! Expense Cache - a namespaced memoization cache
//!
//! Independent namespaces with their own TTL and capacity, approximate-LRU
//! eviction, a periodic sweep, and durable snapshots for persistent
//! namespaces. Ships with a small HTTP host.

pub mod api;
pub mod cache;
pub mod config;
pub mod error;
pub mod models;
pub mod tasks;

pub use api::AppState;
pub use cache::{NamespacedCache, SharedCache};
pub use config::{CacheConfig, Config};
pub use tasks::{spawn_cleanup_task, CacheLifecycle};
