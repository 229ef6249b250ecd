//! Request deduplication with a batching window.

use crate::coalesce::loader::KeyedLoader;
use crate::coalesce::stats::CoalescerStats;
use crate::coalesce::types::CoalesceError;
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::future::Future;
use std::hash::Hash;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::oneshot;
use tracing::debug;

type Outcome<V> = Result<V, CoalesceError>;

/// Waiters attached to one in-flight execution for a key.
///
/// Exists from the moment the first caller registers until the batching
/// window closes; the open-to-executing transition removes it from the
/// registry, so at most one open batch exists per key at any instant.
struct PendingBatch<V> {
    /// Result continuations, in subscription order (leader first)
    waiters: Vec<oneshot::Sender<Outcome<V>>>,
}

/// Coalesces concurrent requests for the same logical key into one
/// execution.
///
/// The first caller for a key becomes the *leader*: it opens a pending
/// batch, waits out the batching window so concurrent callers can attach,
/// then the operation runs exactly once and its outcome (value or error) is
/// delivered identically to every waiter, in subscription order.
///
/// The execution is driven by a spawned task, so a caller that stops
/// waiting does not cancel the work other waiters depend on. A caller that
/// arrives after the window has closed finds no open batch and
/// deterministically starts a new one; the transition happens under the
/// registry lock, never as a check-then-act race.
pub struct RequestCoalescer<V> {
    pending: Arc<Mutex<HashMap<String, PendingBatch<V>>>>,
    window: Duration,
    stats: Arc<Mutex<CoalescerStats>>,
}

impl<V> RequestCoalescer<V>
where
    V: Clone + Send + 'static,
{
    /// Create a coalescer with the given batching window.
    pub fn new(window: Duration) -> Self {
        Self {
            pending: Arc::new(Mutex::new(HashMap::new())),
            window,
            stats: Arc::new(Mutex::new(CoalescerStats::new())),
        }
    }

    /// Run `op` at most once per key while any concurrent request for that
    /// key is outstanding.
    ///
    /// Blocks for the batching window plus the execution time when this
    /// caller is the leader; followers block until the leader's outcome is
    /// delivered. Every waiter observes the identical outcome.
    pub async fn coalesce<Op, Fut, E>(&self, key: &str, op: Op) -> Outcome<V>
    where
        Op: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<V, E>> + Send + 'static,
        E: std::fmt::Display,
    {
        let (tx, rx) = oneshot::channel();

        let is_leader = {
            let mut pending = self.pending.lock().unwrap();
            match pending.entry(key.to_string()) {
                Entry::Occupied(mut batch) => {
                    batch.get_mut().waiters.push(tx);
                    false
                }
                Entry::Vacant(slot) => {
                    slot.insert(PendingBatch { waiters: vec![tx] });
                    true
                }
            }
        };

        if is_leader {
            self.stats.lock().unwrap().record_execution();
            let pending = Arc::clone(&self.pending);
            let stats = Arc::clone(&self.stats);
            let window = self.window;
            let key = key.to_string();

            // Detached driver: survives any individual caller abandoning
            // its wait.
            tokio::spawn(async move {
                tokio::time::sleep(window).await;

                // Window closes: take the batch out of the registry in one
                // locked step. Callers arriving from here on start a new
                // batch.
                let waiters = pending
                    .lock()
                    .unwrap()
                    .remove(&key)
                    .map(|batch| batch.waiters)
                    .unwrap_or_default();
                debug!(key = %key, waiters = waiters.len(), "executing coalesced operation");

                let outcome = match op().await {
                    Ok(value) => Ok(value),
                    Err(err) => {
                        stats.lock().unwrap().record_failure();
                        Err(CoalesceError::operation(err))
                    }
                };
                for waiter in waiters {
                    let _ = waiter.send(outcome.clone());
                }
            });
        } else {
            self.stats.lock().unwrap().record_deduplicated();
        }

        rx.await.map_err(|_| CoalesceError::ExecutionDropped)?
    }

    /// Fan-out helper: coalesce each keyed operation independently and
    /// return all outcomes once the slowest completes. Outcome order matches
    /// input order.
    pub async fn coalesce_many<Op, Fut, E>(&self, ops: Vec<(String, Op)>) -> Vec<Outcome<V>>
    where
        Op: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<V, E>> + Send + 'static,
        E: std::fmt::Display,
    {
        let futures: Vec<_> = ops
            .into_iter()
            .map(|(key, op)| async move { self.coalesce(&key, op).await })
            .collect();
        futures::future::join_all(futures).await
    }

    /// Build a [`KeyedLoader`] that batches all *distinct* keys requested
    /// within one scheduling window into a single `batch_fn` call. The
    /// loader shares this coalescer's window and statistics.
    pub fn keyed_loader<K, F, Fut>(&self, batch_fn: F) -> KeyedLoader<K, V>
    where
        K: Eq + Hash + Clone + Send + 'static,
        F: Fn(Vec<K>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Vec<V>, CoalesceError>> + Send + 'static,
    {
        KeyedLoader::with_stats(self.window, batch_fn, Arc::clone(&self.stats))
    }

    /// The configured batching window.
    pub fn window(&self) -> Duration {
        self.window
    }

    /// Number of currently open batches.
    pub fn pending_count(&self) -> usize {
        self.pending.lock().unwrap().len()
    }

    /// Snapshot of coalescing statistics.
    pub fn stats(&self) -> CoalescerStats {
        self.stats.lock().unwrap().clone()
    }
}
