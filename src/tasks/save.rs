//! Ordered Saves
//!
//! Every background save of persistent namespaces goes through
//! [`save_with`]. The cache's save gate is held from the snapshot until the
//! write finishes, so a slow write can never land on top of a newer one.

use tracing::debug;

use crate::cache::persistence::write_snapshots;
use crate::cache::{NamespacedCache, SharedCache};
use crate::error::{CacheError, Result};

/// Runs `prepare` and snapshots persistent namespaces under the write lock,
/// then writes the snapshots on the blocking pool.
///
/// The cache lock is released before the write; the save gate is not.
/// Returns `prepare`'s output and the number of namespaces written.
pub(crate) async fn save_with<T, F>(cache: &SharedCache, prepare: F) -> (T, Result<usize>)
where
    F: FnOnce(&mut NamespacedCache) -> T,
{
    let gate = cache.read().await.save_gate();
    let _turn = gate.lock().await;

    let (output, snapshots, storage) = {
        let mut guard = cache.write().await;
        let output = prepare(&mut guard);
        (output, guard.snapshot_persistent(), guard.storage())
    };

    if snapshots.is_empty() {
        debug!("No persistent namespaces to save");
        return (output, Ok(0));
    }

    let written = tokio::task::spawn_blocking(move || write_snapshots(storage.as_ref(), &snapshots))
        .await
        .map_err(|err| CacheError::Internal(format!("snapshot writer task failed: {}", err)));

    (output, written)
}
