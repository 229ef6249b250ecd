//! Coalescing statistics.

use serde::Serialize;

/// Statistics for a [`RequestCoalescer`](crate::coalesce::RequestCoalescer).
#[derive(Debug, Clone, Default, Serialize)]
pub struct CoalescerStats {
    /// Executions actually performed (batch leaders)
    pub executions: u64,
    /// Callers that attached to an existing batch instead of executing
    pub deduplicated: u64,
    /// Shared executions that ended in an error
    pub failures: u64,
    /// Batched loader calls performed
    pub loader_batches: u64,
    /// Individual keys served through batched loader calls
    pub loader_keys: u64,
}

impl CoalescerStats {
    /// Create a new statistics tracker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Fraction of callers that were served without a fresh execution
    /// (0.0 to 1.0). Higher is better.
    pub fn dedup_rate(&self) -> f64 {
        let total = self.executions + self.deduplicated;
        if total == 0 {
            0.0
        } else {
            self.deduplicated as f64 / total as f64
        }
    }

    /// Record a batch leader execution.
    pub fn record_execution(&mut self) {
        self.executions += 1;
    }

    /// Record a caller that joined an existing batch.
    pub fn record_deduplicated(&mut self) {
        self.deduplicated += 1;
    }

    /// Record a failed shared execution.
    pub fn record_failure(&mut self) {
        self.failures += 1;
    }

    /// Record one batched loader call serving `keys` distinct keys.
    pub fn record_loader_batch(&mut self, keys: u64) {
        self.loader_batches += 1;
        self.loader_keys += keys;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dedup_rate() {
        let mut stats = CoalescerStats::new();
        assert_eq!(stats.dedup_rate(), 0.0);

        stats.record_execution();
        stats.record_deduplicated();
        stats.record_deduplicated();
        stats.record_deduplicated();
        assert_eq!(stats.dedup_rate(), 0.75);
    }

    #[test]
    fn test_loader_batch_counts() {
        let mut stats = CoalescerStats::new();
        stats.record_loader_batch(5);
        stats.record_loader_batch(3);
        assert_eq!(stats.loader_batches, 2);
        assert_eq!(stats.loader_keys, 8);
    }
}
