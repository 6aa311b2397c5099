//! Sweep Task
//!
//! Background task that periodically purges expired entries and then saves
//! persistent namespaces.

use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::cache::SharedCache;
use crate::tasks::save::save_with;

/// Spawns a background task that sweeps the cache every `interval`.
///
/// The task stops once `shutdown` changes or its sender is dropped. A sweep
/// already in progress, including its save, finishes first, so awaiting the
/// handle guarantees no write is still in flight.
///
/// # Example
/// ```ignore
/// let (stop, shutdown) = watch::channel(false);
/// let sweeper = spawn_cleanup_task(cache.clone(), Duration::from_secs(300), shutdown);
/// // Later, during shutdown:
/// stop.send_replace(true);
/// sweeper.await?;
/// ```
pub fn spawn_cleanup_task(
    cache: SharedCache,
    interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!(interval_ms = interval.as_millis() as u64, "Starting cache sweep task");

        loop {
            tokio::select! {
                _ = tokio::time::sleep(interval) => {}
                _ = shutdown.changed() => {
                    info!("Cache sweep task stopped");
                    return;
                }
            }
            sweep_once(&cache).await;
        }
    })
}

/// Runs a single sweep followed by a save of persistent namespaces.
///
/// Returns the number of expired entries removed.
pub async fn sweep_once(cache: &SharedCache) -> usize {
    let (outcome, saved) = save_with(cache, |guard| guard.sweep()).await;

    if outcome.removed > 0 {
        info!(removed = outcome.removed, "Cache sweep removed expired entries");
    } else {
        debug!("Cache sweep: no expired entries found");
    }

    if let Err(err) = saved {
        warn!(error = %err, "Failed to save persistent namespaces after sweep");
    }

    outcome.removed
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use serde_json::json;
    use tokio::sync::RwLock;

    use crate::cache::persistence::storage_key;
    use crate::cache::{DurableStore, MemoryStore, NamespacedCache};
    use crate::config::{CacheConfig, NamespaceConfig};

    fn shared_cache(storage: Arc<MemoryStore>) -> SharedCache {
        let config = CacheConfig {
            namespaces: vec![
                NamespaceConfig::new("calculations", Some(Duration::from_millis(100)), Some(10)),
                NamespaceConfig::new("configurations", Some(Duration::from_secs(3600)), Some(10)),
            ],
            persistent_namespaces: ["configurations".to_string()].into_iter().collect(),
            ..CacheConfig::default()
        };
        Arc::new(RwLock::new(NamespacedCache::new(&config, storage)))
    }

    #[tokio::test]
    async fn test_cleanup_task_removes_expired_entries() {
        let cache = shared_cache(Arc::new(MemoryStore::new()));
        {
            let mut guard = cache.write().await;
            for key in ["a", "b", "c"] {
                guard.set("calculations", &json!(key), json!(1), None);
            }
        }

        let (_stop, shutdown) = watch::channel(false);
        let handle = spawn_cleanup_task(cache.clone(), Duration::from_millis(50), shutdown);
        tokio::time::sleep(Duration::from_millis(300)).await;
        handle.abort();

        let guard = cache.read().await;
        assert_eq!(guard.len("calculations"), Some(0));
        assert_eq!(guard.stats().expirations, 3);
        assert_eq!(guard.stats().total_requests, 0);
    }

    #[tokio::test]
    async fn test_sweep_once_persists_after_sweep() {
        let storage = Arc::new(MemoryStore::new());
        let cache = shared_cache(storage.clone());
        {
            let mut guard = cache.write().await;
            guard.set("configurations", &json!("product_cleaning"), json!({"price": 45}), None);
            guard.set("calculations", &json!("x"), json!(1), None);
        }

        sweep_once(&cache).await;

        let payload = storage.read(&storage_key("configurations")).unwrap();
        assert!(payload.is_some_and(|p| p.contains("product_cleaning")));
        assert_eq!(storage.read(&storage_key("calculations")).unwrap(), None);
    }

    #[tokio::test]
    async fn test_cleanup_task_preserves_valid_entries() {
        let cache = shared_cache(Arc::new(MemoryStore::new()));
        cache
            .write()
            .await
            .set("configurations", &json!("long_lived"), json!("value"), None);

        let (_stop, shutdown) = watch::channel(false);
        let handle = spawn_cleanup_task(cache.clone(), Duration::from_millis(50), shutdown);
        tokio::time::sleep(Duration::from_millis(150)).await;
        handle.abort();

        let mut guard = cache.write().await;
        assert_eq!(guard.get("configurations", &json!("long_lived")), Some(json!("value")));
    }

    #[tokio::test]
    async fn test_cleanup_task_can_be_aborted() {
        let cache = shared_cache(Arc::new(MemoryStore::new()));
        let (_stop, shutdown) = watch::channel(false);
        let handle = spawn_cleanup_task(cache, Duration::from_millis(50), shutdown);

        handle.abort();

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(handle.is_finished(), "Task should be finished after abort");
    }

    #[tokio::test]
    async fn test_cleanup_task_stops_on_shutdown_signal() {
        let cache = shared_cache(Arc::new(MemoryStore::new()));
        let (stop, shutdown) = watch::channel(false);
        let handle = spawn_cleanup_task(cache, Duration::from_secs(60), shutdown);

        stop.send_replace(true);

        let finished = tokio::time::timeout(Duration::from_secs(1), handle).await;
        assert!(finished.is_ok_and(|joined| joined.is_ok()));
    }

    #[tokio::test]
    async fn test_cleanup_task_stops_when_sender_dropped() {
        let cache = shared_cache(Arc::new(MemoryStore::new()));
        let (stop, shutdown) = watch::channel(false);
        let handle = spawn_cleanup_task(cache, Duration::from_secs(60), shutdown);

        drop(stop);

        let finished = tokio::time::timeout(Duration::from_secs(1), handle).await;
        assert!(finished.is_ok());
    }
}
