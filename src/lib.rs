//! TurboLayer - In-process performance acceleration layer
//!
//! This library provides the performance-critical plumbing for a multi-tenant
//! service: a tiered in-memory cache, concurrent request coalescing, a bounded
//! worker pool for blocking work, and a multi-process cluster supervisor.
//!
//! # High-Level API
//!
//! Application reads go through the [`optimizer`] module, which composes the
//! cache and the coalescer:
//!
//! ```ignore
//! use turbolayer::optimizer::{DataAccessOptimizer, OptimizerConfig, QueryOptions};
//!
//! let optimizer: DataAccessOptimizer<User> =
//!     DataAccessOptimizer::new(OptimizerConfig::default());
//!
//! let user = optimizer
//!     .query("user:1", || fetch_user(1), QueryOptions::default())
//!     .await?;
//! ```
//!
//! The [`pool`] and [`cluster`] modules are orthogonal: the worker pool
//! offloads CPU-bound work onto dedicated OS threads, and the cluster
//! supervisor spreads the host service across worker processes with
//! crash-respawn and rolling-restart semantics.
//!
//! All state is process-local and volatile; nothing survives a restart.
//! Components are constructed explicitly by the host application's startup
//! code and shared by reference, never through implicit globals.

pub mod cache;
pub mod cluster;
pub mod coalesce;
pub mod logging;
pub mod optimizer;
pub mod pool;
pub mod stats;

/// Version of the TurboLayer library.
///
/// Defined in `Cargo.toml` and injected at compile time.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
