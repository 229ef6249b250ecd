//! Composed data-access path: cache, then coalesce, then fetch.
//!
//! [`DataAccessOptimizer`] is the read-side front door. A [`query`] consults
//! the tiered cache, funnels concurrent identical fetches through the
//! request coalescer, bounds the wait with a timeout, and writes successful
//! results back into the cache. [`batch_query`] builds a keyed batch loader
//! on the same primitives.
//!
//! [`query`]: DataAccessOptimizer::query
//! [`batch_query`]: DataAccessOptimizer::batch_query

mod core;
mod stats;
mod types;

pub use self::core::{BatchQuery, DataAccessOptimizer};
pub use stats::OptimizerStats;
pub use types::{BatchQueryOptions, OptimizerConfig, QueryError, QueryOptions};
