//! Optimizer statistics.

use serde::Serialize;

/// Snapshot of query activity through the optimizer.
#[derive(Debug, Clone, Default, Serialize)]
pub struct OptimizerStats {
    /// Queries received (cached or not)
    pub queries: u64,
    /// Queries answered from the cache
    pub cache_hits: u64,
    /// Queries that went to the fetcher
    pub cache_misses: u64,
    /// Queries abandoned at the timeout
    pub timeouts: u64,
    /// Fetches that completed with an error
    pub fetch_failures: u64,
}

impl OptimizerStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fraction of queries answered from the cache (0.0 to 1.0).
    pub fn hit_rate(&self) -> f64 {
        if self.queries == 0 {
            0.0
        } else {
            self.cache_hits as f64 / self.queries as f64
        }
    }

    pub fn record_hit(&mut self) {
        self.queries += 1;
        self.cache_hits += 1;
    }

    pub fn record_miss(&mut self) {
        self.queries += 1;
        self.cache_misses += 1;
    }

    pub fn record_timeout(&mut self) {
        self.timeouts += 1;
    }

    pub fn record_fetch_failure(&mut self) {
        self.fetch_failures += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hit_rate() {
        let mut stats = OptimizerStats::new();
        stats.record_hit();
        stats.record_hit();
        stats.record_hit();
        stats.record_miss();

        assert_eq!(stats.queries, 4);
        assert_eq!(stats.hit_rate(), 0.75);
    }

    #[test]
    fn test_hit_rate_with_no_queries() {
        assert_eq!(OptimizerStats::new().hit_rate(), 0.0);
    }
}
