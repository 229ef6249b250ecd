//! Worker pool configuration.

/// Default backlog capacity for the task queue.
pub const DEFAULT_QUEUE_CAPACITY: usize = 1024;

/// Fallback worker count when CPU detection fails.
const FALLBACK_WORKER_COUNT: usize = 4;

/// What to do when a task is submitted while the backlog queue is full.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueFullPolicy {
    /// Fail the submission immediately with `PoolError::QueueFull`.
    Reject,
    /// Block the producer until the queue has room.
    Block,
}

/// Worker pool configuration.
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Number of worker threads (default: available CPU parallelism)
    pub workers: usize,
    /// Backlog queue capacity (default: [`DEFAULT_QUEUE_CAPACITY`])
    pub queue_capacity: usize,
    /// Backpressure policy when the queue is full (default: `Reject`)
    pub full_policy: QueueFullPolicy,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            workers: default_worker_count(),
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            full_policy: QueueFullPolicy::Reject,
        }
    }
}

impl PoolConfig {
    /// Set the number of worker threads.
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    /// Set the backlog queue capacity.
    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity.max(1);
        self
    }

    /// Set the queue-full policy.
    pub fn with_full_policy(mut self, policy: QueueFullPolicy) -> Self {
        self.full_policy = policy;
        self
    }
}

/// Default worker count: one per available CPU core.
pub fn default_worker_count() -> usize {
    std::thread::available_parallelism()
        .map(|p| p.get())
        .unwrap_or(FALLBACK_WORKER_COUNT)
}
