//! Background Tasks Module
//!
//! # Tasks
//! - Sweep: removes expired entries at the configured interval, then saves
//!   persistent namespaces
//! - Lifecycle: startup load, suspend flush, and idempotent teardown
//!
//! Both save through one gate per cache, so snapshots reach storage in the
//! order they were taken.

mod cleanup;
mod lifecycle;
mod save;

pub use cleanup::{spawn_cleanup_task, sweep_once};
pub use lifecycle::{flush_shared, CacheLifecycle};
