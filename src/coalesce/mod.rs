//! Concurrent request coalescing.
//!
//! [`RequestCoalescer`] collapses concurrent requests for the same logical
//! key into a single execution: the first caller for a key becomes the
//! leader, a short batching window lets concurrent callers attach as
//! followers, then the operation runs exactly once and every waiter receives
//! the identical outcome.
//!
//! [`KeyedLoader`] generalizes this: instead of deduplicating identical keys,
//! it accumulates all *distinct* keys requested within one scheduling window
//! into a single batched fetch, then distributes each value back to the
//! caller that asked for its key.
//!
//! Both require a tokio runtime; the shared execution is driven by a spawned
//! task so that a caller abandoning its wait never cancels the work other
//! waiters depend on.

mod coalescer;
mod loader;
mod stats;
mod types;

pub use coalescer::RequestCoalescer;
pub use loader::KeyedLoader;
pub use stats::CoalescerStats;
pub use types::CoalesceError;
