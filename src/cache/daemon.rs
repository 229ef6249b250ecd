//! Background daemon for cache maintenance.
//!
//! The daemon runs in a separate thread and periodically asks the cache to
//! sweep expired entries and promote the highest-frequency keys into the hot
//! tier. Promotion passes are best-effort and carry no ordering guarantee
//! relative to foreground reads.

use crate::cache::tiered::TieredCache;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Background maintenance daemon for a [`TieredCache`].
///
/// Runs in a dedicated thread and can be cleanly shut down by calling
/// `shutdown()` or dropping the daemon.
pub struct CacheMaintenanceDaemon {
    /// Handle to the daemon thread
    thread_handle: Option<JoinHandle<()>>,
    /// Shutdown signal
    shutdown: Arc<AtomicBool>,
}

impl CacheMaintenanceDaemon {
    /// Start a maintenance daemon for the given cache.
    ///
    /// The run interval comes from the cache configuration
    /// (`maintenance_interval_secs`).
    pub fn start<V>(cache: Arc<TieredCache<V>>) -> Self
    where
        V: Clone + Send + Sync + 'static,
    {
        let interval_secs = cache.maintenance_interval_secs();
        let shutdown = Arc::new(AtomicBool::new(false));
        let shutdown_clone = shutdown.clone();

        let thread_handle = thread::Builder::new()
            .name("cache-maintenance".to_string())
            .spawn(move || {
                Self::run_loop(cache, interval_secs, shutdown_clone);
            })
            .expect("Failed to spawn cache maintenance thread");

        info!("Cache maintenance daemon started (interval: {}s)", interval_secs);

        Self {
            thread_handle: Some(thread_handle),
            shutdown,
        }
    }

    /// The main daemon loop.
    fn run_loop<V>(cache: Arc<TieredCache<V>>, interval_secs: u64, shutdown: Arc<AtomicBool>)
    where
        V: Clone + Send + Sync + 'static,
    {
        let interval = Duration::from_secs(interval_secs);

        // Sleep in short intervals so shutdown stays responsive
        let check_interval = Duration::from_millis(200);
        let mut elapsed = Duration::ZERO;

        loop {
            if shutdown.load(Ordering::Relaxed) {
                debug!("Cache maintenance daemon received shutdown signal");
                break;
            }

            thread::sleep(check_interval);
            elapsed += check_interval;

            if elapsed >= interval {
                elapsed = Duration::ZERO;
                cache.run_maintenance();
                debug!("Cache maintenance pass complete");
            }
        }

        debug!("Cache maintenance daemon stopped");
    }

    /// Signal the daemon to shut down.
    ///
    /// Non-blocking; the daemon stops at its next check interval. Call
    /// `join()` afterwards to wait for the thread to finish.
    pub fn shutdown(&self) {
        self.shutdown.store(true, Ordering::Relaxed);
    }

    /// Wait for the daemon thread to finish.
    pub fn join(&mut self) {
        if let Some(handle) = self.thread_handle.take() {
            if let Err(e) = handle.join() {
                warn!("Cache maintenance thread panicked: {:?}", e);
            }
        }
    }

    /// Check if the daemon is still running.
    pub fn is_running(&self) -> bool {
        self.thread_handle
            .as_ref()
            .map(|h| !h.is_finished())
            .unwrap_or(false)
    }
}

impl Drop for CacheMaintenanceDaemon {
    fn drop(&mut self) {
        self.shutdown();
        self.join();
    }
}
