//! Cache statistics tracking and reporting.

use serde::Serialize;
use std::time::Instant;

/// Cache statistics for monitoring and debugging.
#[derive(Debug, Clone, Serialize)]
pub struct CacheStats {
    // Hot tier metrics
    pub hot_hits: u64,
    pub hot_entry_count: usize,
    pub hot_evictions: u64,
    pub promotions: u64,

    // Standard tier metrics
    pub standard_hits: u64,
    pub standard_entry_count: usize,

    // Shared metrics
    pub misses: u64,
    pub writes: u64,
    pub expired_removals: u64,
    pub invalidations: u64,

    // Timing
    #[serde(skip)]
    pub created_at: Instant,
}

impl Default for CacheStats {
    fn default() -> Self {
        Self::new()
    }
}

impl CacheStats {
    /// Create a new statistics tracker.
    pub fn new() -> Self {
        Self {
            hot_hits: 0,
            hot_entry_count: 0,
            hot_evictions: 0,
            promotions: 0,
            standard_hits: 0,
            standard_entry_count: 0,
            misses: 0,
            writes: 0,
            expired_removals: 0,
            invalidations: 0,
            created_at: Instant::now(),
        }
    }

    /// Calculate the hot tier hit rate (0.0 to 1.0).
    ///
    /// Fraction of all lookups answered by the hot tier.
    pub fn hot_hit_rate(&self) -> f64 {
        let total = self.hot_hits + self.standard_hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hot_hits as f64 / total as f64
        }
    }

    /// Calculate the overall hit rate (0.0 to 1.0).
    pub fn overall_hit_rate(&self) -> f64 {
        let hits = self.hot_hits + self.standard_hits;
        let total = hits + self.misses;
        if total == 0 {
            0.0
        } else {
            hits as f64 / total as f64
        }
    }

    /// Uptime since statistics started.
    pub fn uptime(&self) -> std::time::Duration {
        self.created_at.elapsed()
    }

    /// Record a hot tier hit.
    pub fn record_hot_hit(&mut self) {
        self.hot_hits += 1;
    }

    /// Record a standard tier hit.
    pub fn record_standard_hit(&mut self) {
        self.standard_hits += 1;
    }

    /// Record a miss in both tiers.
    pub fn record_miss(&mut self) {
        self.misses += 1;
    }

    /// Record a write.
    pub fn record_write(&mut self) {
        self.writes += 1;
    }

    /// Record a promotion into the hot tier.
    pub fn record_promotion(&mut self) {
        self.promotions += 1;
    }

    /// Record a hot tier eviction.
    pub fn record_hot_eviction(&mut self) {
        self.hot_evictions += 1;
    }

    /// Record lazily removed expired entries.
    pub fn record_expired(&mut self, count: u64) {
        self.expired_removals += count;
    }

    /// Record pattern-invalidated keys.
    pub fn record_invalidations(&mut self, count: u64) {
        self.invalidations += count;
    }

    /// Update entry counts from the tier maps.
    pub fn update_entry_counts(&mut self, hot: usize, standard: usize) {
        self.hot_entry_count = hot;
        self.standard_entry_count = standard;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_stats_are_zero() {
        let stats = CacheStats::new();
        assert_eq!(stats.hot_hits, 0);
        assert_eq!(stats.standard_hits, 0);
        assert_eq!(stats.misses, 0);
        assert_eq!(stats.overall_hit_rate(), 0.0);
        assert_eq!(stats.hot_hit_rate(), 0.0);
    }

    #[test]
    fn test_hit_rates() {
        let mut stats = CacheStats::new();
        stats.record_hot_hit();
        stats.record_hot_hit();
        stats.record_standard_hit();
        stats.record_miss();

        assert_eq!(stats.hot_hit_rate(), 0.5);
        assert_eq!(stats.overall_hit_rate(), 0.75);
    }

    #[test]
    fn test_record_counts() {
        let mut stats = CacheStats::new();
        stats.record_write();
        stats.record_promotion();
        stats.record_hot_eviction();
        stats.record_expired(3);
        stats.record_invalidations(2);
        stats.update_entry_counts(1, 4);

        assert_eq!(stats.writes, 1);
        assert_eq!(stats.promotions, 1);
        assert_eq!(stats.hot_evictions, 1);
        assert_eq!(stats.expired_removals, 3);
        assert_eq!(stats.invalidations, 2);
        assert_eq!(stats.hot_entry_count, 1);
        assert_eq!(stats.standard_entry_count, 4);
    }

    #[test]
    fn test_serializes_to_json() {
        let stats = CacheStats::new();
        let json = serde_json::to_value(&stats).unwrap();
        assert!(json.get("hot_hits").is_some());
        assert!(json.get("created_at").is_none(), "Instant is not serialized");
    }
}
