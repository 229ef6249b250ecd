//! Task abstraction and pool error types.

use thiserror::Error;

/// A failure produced by a task itself.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{message}")]
pub struct TaskError {
    message: String,
}

impl TaskError {
    /// Create a task error with the given message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// The error message.
    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Errors surfaced to pool callers.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PoolError {
    /// The backlog queue is at capacity and the pool is configured to
    /// reject rather than block.
    #[error("worker pool queue is full")]
    QueueFull,

    /// The pool has been terminated and accepts no new work.
    #[error("worker pool is terminated")]
    Terminated,

    /// The task ran and failed. Isolated to this task's caller; the worker
    /// that ran it remains usable.
    #[error("task failed: {0}")]
    Task(TaskError),

    /// The task panicked while running. The worker survives.
    #[error("task panicked while running")]
    TaskPanicked,

    /// The worker delivering this task's result went away before sending it.
    #[error("task result was dropped before delivery")]
    ResultDropped,
}

/// A compiled unit of work the pool knows how to execute.
///
/// One runner instance is shared by every worker thread; per-task state
/// travels in the payload.
pub trait TaskRunner: Send + Sync + 'static {
    /// Input carried by each submitted task.
    type Payload: Send + 'static;
    /// Output produced on success.
    type Output: Send + 'static;

    /// Execute one task to completion. Runs on a worker thread; blocking
    /// here is expected and fine.
    fn run(&self, payload: Self::Payload) -> Result<Self::Output, TaskError>;
}
