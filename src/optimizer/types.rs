//! Optimizer configuration, per-query options, and errors.

use crate::cache::CacheConfig;
use crate::coalesce::CoalesceError;
use std::time::Duration;
use thiserror::Error;

/// Default bound on how long a query waits for its fetcher.
const DEFAULT_QUERY_TIMEOUT: Duration = Duration::from_secs(10);

/// Default coalescing window for queries and batch loaders.
const DEFAULT_BATCH_WINDOW: Duration = Duration::from_millis(50);

/// Construction-time optimizer configuration.
#[derive(Debug, Clone)]
pub struct OptimizerConfig {
    /// Tiered cache configuration
    pub cache: CacheConfig,
    /// Coalescing window shared by queries and batch loaders (default: 50ms)
    pub batch_window: Duration,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            cache: CacheConfig::default(),
            batch_window: DEFAULT_BATCH_WINDOW,
        }
    }
}

impl OptimizerConfig {
    /// Set the cache configuration.
    pub fn with_cache(mut self, cache: CacheConfig) -> Self {
        self.cache = cache;
        self
    }

    /// Set the coalescing window.
    pub fn with_batch_window(mut self, window: Duration) -> Self {
        self.batch_window = window;
        self
    }
}

/// Per-query options.
#[derive(Debug, Clone)]
pub struct QueryOptions {
    /// Consult and populate the cache (default: true)
    pub cache: bool,
    /// TTL for a populated cache entry; `None` uses the tier default
    pub cache_ttl: Option<Duration>,
    /// Coalesce concurrent identical fetches (default: true)
    pub coalesce: bool,
    /// How long to wait for the fetcher before giving up (default: 10s)
    pub timeout: Duration,
}

impl Default for QueryOptions {
    fn default() -> Self {
        Self {
            cache: true,
            cache_ttl: None,
            coalesce: true,
            timeout: DEFAULT_QUERY_TIMEOUT,
        }
    }
}

impl QueryOptions {
    /// Enable or disable the cache for this query.
    pub fn with_cache(mut self, cache: bool) -> Self {
        self.cache = cache;
        self
    }

    /// Set the TTL used when the result is cached.
    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = Some(ttl);
        self
    }

    /// Enable or disable coalescing for this query.
    pub fn with_coalesce(mut self, coalesce: bool) -> Self {
        self.coalesce = coalesce;
        self
    }

    /// Set the wait timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Options for a batch query loader.
#[derive(Debug, Clone)]
pub struct BatchQueryOptions {
    /// Consult and populate the cache per resolved key (default: true)
    pub cache: bool,
    /// TTL for populated cache entries; `None` uses the tier default
    pub cache_ttl: Option<Duration>,
}

impl Default for BatchQueryOptions {
    fn default() -> Self {
        Self {
            cache: true,
            cache_ttl: None,
        }
    }
}

impl BatchQueryOptions {
    /// Enable or disable the cache for this loader.
    pub fn with_cache(mut self, cache: bool) -> Self {
        self.cache = cache;
        self
    }

    /// Set the TTL used when resolved values are cached.
    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = Some(ttl);
        self
    }
}

/// Query failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueryError {
    /// The caller stopped waiting. The underlying fetch may still complete;
    /// its late result is discarded and never cached.
    #[error("query timed out waiting for the fetcher")]
    TimedOut,

    /// The fetcher itself failed
    #[error("fetch failed: {0}")]
    Fetch(String),

    /// A coalesced execution failed
    #[error(transparent)]
    Coalesce(#[from] CoalesceError),
}
