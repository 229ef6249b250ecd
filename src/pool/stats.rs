//! Worker pool statistics.

use serde::Serialize;

/// Snapshot of worker pool activity.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PoolStats {
    /// Configured number of worker threads
    pub workers: usize,
    /// Workers currently running a task
    pub busy: usize,
    /// Tasks waiting in the backlog queue
    pub queued: usize,
    /// Tasks accepted since construction
    pub submitted: u64,
    /// Tasks completed successfully
    pub completed: u64,
    /// Tasks that ran and failed (or panicked)
    pub failed: u64,
    /// Submissions rejected because the queue was full
    pub rejected: u64,
}

impl PoolStats {
    /// Fraction of workers currently busy (0.0 to 1.0).
    pub fn utilization(&self) -> f64 {
        if self.workers == 0 {
            0.0
        } else {
            self.busy as f64 / self.workers as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_utilization() {
        let stats = PoolStats {
            workers: 4,
            busy: 1,
            ..Default::default()
        };
        assert_eq!(stats.utilization(), 0.25);
    }

    #[test]
    fn test_utilization_with_no_workers() {
        assert_eq!(PoolStats::default().utilization(), 0.0);
    }
}
