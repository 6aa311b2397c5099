//! Cache Lifecycle
//!
//! Explicit replacements for host lifecycle events: startup load, flush on
//! suspend, and a one-shot teardown.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::cache::SharedCache;
use crate::tasks::save::save_with;
use crate::tasks::spawn_cleanup_task;

/// Owns the sweep task and the teardown of one shared cache.
#[derive(Debug)]
pub struct CacheLifecycle {
    cache: SharedCache,
    stop_sweeper: watch::Sender<bool>,
    sweeper: Mutex<Option<JoinHandle<()>>>,
    destroyed: AtomicBool,
}

impl CacheLifecycle {
    /// Loads persistent namespaces and starts the periodic sweep.
    pub async fn start(cache: SharedCache, cleanup_interval: Duration) -> Self {
        let restored = cache.write().await.init();
        info!(restored, "Cache initialised");

        let (stop_sweeper, shutdown) = watch::channel(false);
        let sweeper = spawn_cleanup_task(cache.clone(), cleanup_interval, shutdown);

        Self {
            cache,
            stop_sweeper,
            sweeper: Mutex::new(Some(sweeper)),
            destroyed: AtomicBool::new(false),
        }
    }

    pub fn cache(&self) -> &SharedCache {
        &self.cache
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed.load(Ordering::SeqCst)
    }

    /// Saves persistent namespaces. Returns how many were written.
    pub async fn flush(&self) -> usize {
        flush_shared(&self.cache).await
    }

    /// Host is moving to the background: save what we have.
    pub async fn on_suspend(&self) -> usize {
        info!("Host suspended, flushing persistent namespaces");
        self.flush().await
    }

    /// Drives the host until it exits, then destroys the cache.
    ///
    /// The host's result is returned after the final flush, so an error
    /// exit still saves persistent namespaces.
    pub async fn run_until_exit<F, T>(&self, host: F) -> T
    where
        F: std::future::Future<Output = T>,
    {
        let exited = host.await;
        self.destroy().await;
        exited
    }

    /// Stops the sweep, waits for any save it started, then performs the
    /// final flush.
    ///
    /// Only the first call does anything; later calls return `None`.
    pub async fn destroy(&self) -> Option<usize> {
        if self.destroyed.swap(true, Ordering::SeqCst) {
            return None;
        }

        self.stop_sweeper.send_replace(true);
        let sweeper = self.sweeper.lock().take();
        if let Some(sweeper) = sweeper {
            if let Err(err) = sweeper.await {
                warn!(error = %err, "Sweep task ended abnormally");
            }
        }

        let saved = self.flush().await;
        info!(saved, "Cache destroyed");
        Some(saved)
    }
}

/// Saves persistent namespaces through the cache's save gate.
///
/// Failures are logged; the return value is the number of namespaces written.
pub async fn flush_shared(cache: &SharedCache) -> usize {
    match save_with(cache, |_| ()).await {
        ((), Ok(saved)) => saved,
        ((), Err(err)) => {
            warn!(error = %err, "Failed to save persistent namespaces");
            0
        }
    }
}
