//! Core types and configuration for the cache system.

use std::time::Duration;

/// Tiered cache configuration.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Maximum number of entries in the hot tier (default: 1000)
    pub hot_capacity: usize,
    /// TTL applied to hot-tier entries on write and promotion (default: 60s)
    pub hot_ttl: Duration,
    /// Default TTL for standard-tier entries when `set` is called without an
    /// explicit TTL (default: 300s)
    pub standard_ttl: Duration,
    /// Access count at which a key is considered hot (default: 5)
    pub hot_threshold: u64,
    /// Access counter is pruned once it tracks more than this many keys
    /// (default: 10_000)
    pub counter_cap: usize,
    /// Number of top-accessed keys kept when the counter is pruned
    /// (default: 1000)
    pub counter_keep: usize,
    /// Interval for the background maintenance daemon in seconds (default: 30)
    pub maintenance_interval_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            hot_capacity: 1000,
            hot_ttl: Duration::from_secs(60),
            standard_ttl: Duration::from_secs(300),
            hot_threshold: 5,
            counter_cap: 10_000,
            counter_keep: 1000,
            maintenance_interval_secs: 30,
        }
    }
}

impl CacheConfig {
    /// Set the hot tier capacity.
    pub fn with_hot_capacity(mut self, capacity: usize) -> Self {
        self.hot_capacity = capacity;
        self
    }

    /// Set the hot tier TTL.
    pub fn with_hot_ttl(mut self, ttl: Duration) -> Self {
        self.hot_ttl = ttl;
        self
    }

    /// Set the default standard tier TTL.
    pub fn with_standard_ttl(mut self, ttl: Duration) -> Self {
        self.standard_ttl = ttl;
        self
    }

    /// Set the access count at which a key becomes hot.
    pub fn with_hot_threshold(mut self, threshold: u64) -> Self {
        self.hot_threshold = threshold;
        self
    }

    /// Set the maintenance daemon interval in seconds.
    pub fn with_maintenance_interval_secs(mut self, secs: u64) -> Self {
        self.maintenance_interval_secs = secs;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = CacheConfig::default();
        assert_eq!(config.hot_capacity, 1000);
        assert_eq!(config.hot_ttl, Duration::from_secs(60));
        assert_eq!(config.standard_ttl, Duration::from_secs(300));
        assert_eq!(config.hot_threshold, 5);
        assert_eq!(config.counter_cap, 10_000);
        assert_eq!(config.counter_keep, 1000);
    }

    #[test]
    fn test_config_builder() {
        let config = CacheConfig::default()
            .with_hot_capacity(10)
            .with_hot_ttl(Duration::from_secs(5))
            .with_standard_ttl(Duration::from_secs(30))
            .with_hot_threshold(2)
            .with_maintenance_interval_secs(1);

        assert_eq!(config.hot_capacity, 10);
        assert_eq!(config.hot_ttl, Duration::from_secs(5));
        assert_eq!(config.standard_ttl, Duration::from_secs(30));
        assert_eq!(config.hot_threshold, 2);
        assert_eq!(config.maintenance_interval_secs, 1);
    }
}
