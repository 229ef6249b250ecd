//! Worker pool core: dispatch loop and submission surface.

use crate::pool::config::{PoolConfig, QueueFullPolicy};
use crate::pool::stats::PoolStats;
use crate::pool::task::{PoolError, TaskRunner};
use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

/// A task in flight: payload plus the channel its result travels back on.
struct PoolTask<R: TaskRunner> {
    id: u64,
    payload: R::Payload,
    result_tx: oneshot::Sender<Result<R::Output, PoolError>>,
}

#[derive(Default)]
struct PoolCounters {
    submitted: AtomicU64,
    completed: AtomicU64,
    failed: AtomicU64,
    rejected: AtomicU64,
    busy: AtomicUsize,
}

/// Awaitable handle to one submitted task.
pub struct TaskHandle<O> {
    rx: oneshot::Receiver<Result<O, PoolError>>,
}

impl<O> TaskHandle<O> {
    /// Wait for the task to complete.
    pub async fn wait(self) -> Result<O, PoolError> {
        self.rx.await.map_err(|_| PoolError::ResultDropped)?
    }
}

/// Fixed-size pool of named OS threads running [`TaskRunner`] tasks.
///
/// Tasks flow through a bounded MPMC channel: an idle worker picks a task up
/// immediately, otherwise it waits in FIFO order. Handing a task to a worker
/// and returning that worker to the idle set are both single channel
/// operations, so a task is never dispatched twice and the busy count never
/// exceeds the worker count.
///
/// Termination policy: `terminate` closes intake, lets workers drain the
/// already accepted backlog and finish in-flight tasks, then joins every
/// worker thread.
pub struct WorkerPool<R: TaskRunner> {
    /// Intake side; `None` once terminated
    task_tx: Mutex<Option<Sender<PoolTask<R>>>>,
    /// Kept only to observe queue depth; workers hold their own clones
    task_rx: Receiver<PoolTask<R>>,
    handles: Mutex<Vec<JoinHandle<()>>>,
    counters: Arc<PoolCounters>,
    next_id: AtomicU64,
    config: PoolConfig,
}

impl<R: TaskRunner> WorkerPool<R> {
    /// Create a pool and spawn its worker threads.
    pub fn new(runner: R, config: PoolConfig) -> Self {
        let (task_tx, task_rx) = bounded::<PoolTask<R>>(config.queue_capacity);
        let runner = Arc::new(runner);
        let counters = Arc::new(PoolCounters::default());

        let mut handles = Vec::with_capacity(config.workers);
        for index in 0..config.workers {
            let rx = task_rx.clone();
            let runner = Arc::clone(&runner);
            let counters = Arc::clone(&counters);
            let handle = thread::Builder::new()
                .name(format!("pool-worker-{}", index))
                .spawn(move || {
                    Self::worker_loop(rx, runner, counters);
                })
                .expect("Failed to spawn pool worker thread");
            handles.push(handle);
        }

        info!(
            workers = config.workers,
            queue_capacity = config.queue_capacity,
            "worker pool started"
        );

        Self {
            task_tx: Mutex::new(Some(task_tx)),
            task_rx,
            handles: Mutex::new(handles),
            counters,
            next_id: AtomicU64::new(0),
            config,
        }
    }

    /// One worker: pull tasks until the intake closes and the queue drains.
    fn worker_loop(rx: Receiver<PoolTask<R>>, runner: Arc<R>, counters: Arc<PoolCounters>) {
        while let Ok(task) = rx.recv() {
            let PoolTask {
                id,
                payload,
                result_tx,
            } = task;

            counters.busy.fetch_add(1, Ordering::SeqCst);
            let result = match catch_unwind(AssertUnwindSafe(|| runner.run(payload))) {
                Ok(Ok(output)) => {
                    counters.completed.fetch_add(1, Ordering::SeqCst);
                    Ok(output)
                }
                Ok(Err(err)) => {
                    counters.failed.fetch_add(1, Ordering::SeqCst);
                    Err(PoolError::Task(err))
                }
                Err(_) => {
                    counters.failed.fetch_add(1, Ordering::SeqCst);
                    warn!(task_id = id, "task panicked; worker continues");
                    Err(PoolError::TaskPanicked)
                }
            };
            counters.busy.fetch_sub(1, Ordering::SeqCst);

            if result_tx.send(result).is_err() {
                debug!(task_id = id, "caller abandoned task result");
            }
        }
    }

    /// Submit a task without waiting for its result.
    ///
    /// Returns a [`TaskHandle`] immediately; queue-full behavior follows the
    /// configured [`QueueFullPolicy`].
    pub fn submit(&self, payload: R::Payload) -> Result<TaskHandle<R::Output>, PoolError> {
        let tx = {
            let guard = self.task_tx.lock().unwrap();
            guard.as_ref().ok_or(PoolError::Terminated)?.clone()
        };

        let (result_tx, rx) = oneshot::channel();
        let task = PoolTask {
            id: self.next_id.fetch_add(1, Ordering::SeqCst),
            payload,
            result_tx,
        };

        match self.config.full_policy {
            QueueFullPolicy::Reject => match tx.try_send(task) {
                Ok(()) => {}
                Err(TrySendError::Full(_)) => {
                    self.counters.rejected.fetch_add(1, Ordering::SeqCst);
                    return Err(PoolError::QueueFull);
                }
                Err(TrySendError::Disconnected(_)) => return Err(PoolError::Terminated),
            },
            QueueFullPolicy::Block => {
                tx.send(task).map_err(|_| PoolError::Terminated)?;
            }
        }

        self.counters.submitted.fetch_add(1, Ordering::SeqCst);
        Ok(TaskHandle { rx })
    }

    /// Submit a task and wait for its result.
    pub async fn execute(&self, payload: R::Payload) -> Result<R::Output, PoolError> {
        self.submit(payload)?.wait().await
    }

    /// Concurrent fan-out over `execute`.
    ///
    /// All payloads are submitted before any result is awaited, so they run
    /// in parallel up to the worker count. Result order matches input order.
    pub async fn execute_many(
        &self,
        payloads: Vec<R::Payload>,
    ) -> Vec<Result<R::Output, PoolError>> {
        let handles: Vec<_> = payloads.into_iter().map(|p| self.submit(p)).collect();
        let mut results = Vec::with_capacity(handles.len());
        for handle in handles {
            match handle {
                Ok(handle) => results.push(handle.wait().await),
                Err(err) => results.push(Err(err)),
            }
        }
        results
    }

    /// Stop accepting work and tear the pool down.
    ///
    /// Already accepted tasks (queued and in flight) run to completion;
    /// worker threads are then joined. Subsequent submissions fail with
    /// [`PoolError::Terminated`]. Idempotent.
    pub fn terminate(&self) {
        let tx = self.task_tx.lock().unwrap().take();
        if tx.is_none() {
            return;
        }
        drop(tx);

        let handles: Vec<_> = self.handles.lock().unwrap().drain(..).collect();
        for handle in handles {
            if handle.join().is_err() {
                warn!("pool worker thread panicked during shutdown");
            }
        }
        info!("worker pool terminated");
    }

    /// Whether `terminate` has been called.
    pub fn is_terminated(&self) -> bool {
        self.task_tx.lock().unwrap().is_none()
    }

    /// Configured worker count.
    pub fn capacity(&self) -> usize {
        self.config.workers
    }

    /// Snapshot of pool statistics.
    pub fn stats(&self) -> PoolStats {
        PoolStats {
            workers: self.config.workers,
            busy: self.counters.busy.load(Ordering::SeqCst),
            queued: self.task_rx.len(),
            submitted: self.counters.submitted.load(Ordering::SeqCst),
            completed: self.counters.completed.load(Ordering::SeqCst),
            failed: self.counters.failed.load(Ordering::SeqCst),
            rejected: self.counters.rejected.load(Ordering::SeqCst),
        }
    }
}

impl<R: TaskRunner> Drop for WorkerPool<R> {
    fn drop(&mut self) {
        self.terminate();
    }
}
