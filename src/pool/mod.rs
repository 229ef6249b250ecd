//! Bounded worker pool for blocking and CPU-bound work.
//!
//! A fixed set of named OS threads consumes tasks from a bounded FIFO queue.
//! Tasks are described by a compiled [`TaskRunner`] implementation; there is
//! no runtime code generation. Results travel back to the submitting caller
//! over a completion channel, so submission can happen from sync or async
//! contexts alike.
//!
//! The backlog queue is explicitly bounded: when it is full, submissions are
//! either rejected fast ([`QueueFullPolicy::Reject`], the default) or the
//! producer blocks until room frees up ([`QueueFullPolicy::Block`]).
//!
//! A failing task rejects only its own caller; the worker that ran it stays
//! in the pool.

mod config;
mod core;
mod stats;
mod task;

pub use config::{PoolConfig, QueueFullPolicy, DEFAULT_QUEUE_CAPACITY};
pub use self::core::{TaskHandle, WorkerPool};
pub use stats::PoolStats;
pub use task::{PoolError, TaskError, TaskRunner};
