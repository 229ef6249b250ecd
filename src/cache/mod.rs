//! Tiered in-memory cache.
//!
//! Two associative tiers share one key space: a small *hot* tier with short
//! TTLs for frequently accessed keys, and a larger *standard* tier with
//! longer TTLs for everything. Reads check the hot tier first; a standard-tier
//! hit whose key has crossed the hot threshold is promoted into the hot tier.
//!
//! Expired entries are removed lazily on lookup. A background
//! [`CacheMaintenanceDaemon`] periodically sweeps expired entries and promotes
//! the highest-frequency keys that have not yet reached the hot tier.
//!
//! The cache is a best-effort acceleration structure, not a source of truth:
//! it may evict entries that will be needed again, but it never returns a
//! value whose TTL has elapsed.

mod counter;
mod daemon;
mod stats;
mod tiered;
mod types;

pub use counter::AccessCounter;
pub use daemon::CacheMaintenanceDaemon;
pub use stats::CacheStats;
pub use tiered::TieredCache;
pub use types::CacheConfig;
