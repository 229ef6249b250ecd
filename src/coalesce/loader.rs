//! Keyed batch loading.

use crate::coalesce::stats::CoalescerStats;
use crate::coalesce::types::CoalesceError;
use std::collections::HashMap;
use std::future::Future;
use std::hash::Hash;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::oneshot;
use tracing::debug;

type Outcome<V> = Result<V, CoalesceError>;
type BoxedBatchFn<K, V> = Arc<
    dyn Fn(Vec<K>) -> Pin<Box<dyn Future<Output = Result<Vec<V>, CoalesceError>> + Send>>
        + Send
        + Sync,
>;

/// Keys and waiters accumulated during one scheduling window.
struct PendingLoad<K, V> {
    /// Requested keys in arrival order; position `i` pairs with `waiters[i]`
    keys: Vec<K>,
    /// Waiters per key slot; duplicates of a key share one slot
    waiters: Vec<Vec<oneshot::Sender<Outcome<V>>>>,
    /// Key to slot index, for duplicate detection
    slots: HashMap<K, usize>,
}

impl<K: Eq + Hash + Clone, V> PendingLoad<K, V> {
    fn new() -> Self {
        Self {
            keys: Vec::new(),
            waiters: Vec::new(),
            slots: HashMap::new(),
        }
    }

    fn attach(&mut self, key: K, tx: oneshot::Sender<Outcome<V>>) {
        match self.slots.get(&key) {
            Some(&slot) => self.waiters[slot].push(tx),
            None => {
                let slot = self.keys.len();
                self.slots.insert(key.clone(), slot);
                self.keys.push(key);
                self.waiters.push(vec![tx]);
            }
        }
    }
}

/// Accumulates all distinct keys requested within one scheduling window into
/// a single batched fetch.
///
/// The first `load` call in a window schedules a driver task; every key
/// requested before the window closes joins the same `batch_fn(keys)` call,
/// and `values[i]` is distributed back to the callers that requested
/// `keys[i]`. Positional key-to-value correspondence is preserved even
/// though many distinct keys travel in one call.
///
/// Built by [`RequestCoalescer::keyed_loader`](crate::coalesce::RequestCoalescer::keyed_loader)
/// or standalone via [`KeyedLoader::new`].
pub struct KeyedLoader<K, V> {
    batch_fn: BoxedBatchFn<K, V>,
    window: Duration,
    pending: Arc<Mutex<Option<PendingLoad<K, V>>>>,
    stats: Arc<Mutex<CoalescerStats>>,
}

impl<K, V> Clone for KeyedLoader<K, V> {
    fn clone(&self) -> Self {
        Self {
            batch_fn: Arc::clone(&self.batch_fn),
            window: self.window,
            pending: Arc::clone(&self.pending),
            stats: Arc::clone(&self.stats),
        }
    }
}

impl<K, V> KeyedLoader<K, V>
where
    K: Eq + Hash + Clone + Send + 'static,
    V: Clone + Send + 'static,
{
    /// Create a standalone loader with its own statistics.
    pub fn new<F, Fut>(window: Duration, batch_fn: F) -> Self
    where
        F: Fn(Vec<K>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Vec<V>, CoalesceError>> + Send + 'static,
    {
        Self::with_stats(
            window,
            batch_fn,
            Arc::new(Mutex::new(CoalescerStats::new())),
        )
    }

    /// Create a loader that records into a shared statistics tracker.
    pub(crate) fn with_stats<F, Fut>(
        window: Duration,
        batch_fn: F,
        stats: Arc<Mutex<CoalescerStats>>,
    ) -> Self
    where
        F: Fn(Vec<K>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Vec<V>, CoalesceError>> + Send + 'static,
    {
        Self {
            batch_fn: Arc::new(move |keys| Box::pin(batch_fn(keys))),
            window,
            pending: Arc::new(Mutex::new(None)),
            stats,
        }
    }

    /// Request the value for one key.
    ///
    /// Blocks until the batch containing this key resolves. All callers for
    /// the same key within a window share one slot and observe the same
    /// outcome.
    pub async fn load(&self, key: K) -> Outcome<V> {
        let (tx, rx) = oneshot::channel();

        let is_first = {
            let mut pending = self.pending.lock().unwrap();
            match pending.as_mut() {
                Some(load) => {
                    load.attach(key, tx);
                    false
                }
                None => {
                    let mut load = PendingLoad::new();
                    load.attach(key, tx);
                    *pending = Some(load);
                    true
                }
            }
        };

        if is_first {
            let batch_fn = Arc::clone(&self.batch_fn);
            let pending = Arc::clone(&self.pending);
            let stats = Arc::clone(&self.stats);
            let window = self.window;

            tokio::spawn(async move {
                tokio::time::sleep(window).await;

                // Close the window: take the whole accumulation in one
                // locked step so later callers start a fresh batch.
                let load = pending.lock().unwrap().take();
                let Some(load) = load else { return };
                let key_count = load.keys.len();
                debug!(keys = key_count, "executing batched load");
                stats.lock().unwrap().record_loader_batch(key_count as u64);

                match batch_fn(load.keys).await {
                    Ok(values) if values.len() == key_count => {
                        for (value, waiters) in values.into_iter().zip(load.waiters) {
                            for waiter in waiters {
                                let _ = waiter.send(Ok(value.clone()));
                            }
                        }
                    }
                    Ok(values) => {
                        let err = CoalesceError::BatchShapeMismatch {
                            expected: key_count,
                            got: values.len(),
                        };
                        stats.lock().unwrap().record_failure();
                        for waiters in load.waiters {
                            for waiter in waiters {
                                let _ = waiter.send(Err(err.clone()));
                            }
                        }
                    }
                    Err(err) => {
                        stats.lock().unwrap().record_failure();
                        for waiters in load.waiters {
                            for waiter in waiters {
                                let _ = waiter.send(Err(err.clone()));
                            }
                        }
                    }
                }
            });
        }

        rx.await.map_err(|_| CoalesceError::ExecutionDropped)?
    }

    /// Snapshot of the loader's statistics.
    pub fn stats(&self) -> CoalescerStats {
        self.stats.lock().unwrap().clone()
    }
}
