//! Aggregated statistics surface.
//!
//! [`LayerStats`] gathers the per-component snapshots into one serializable
//! struct, intended to back a diagnostic JSON endpoint in the hosting
//! application. All state is process-local; nothing here persists.

use crate::cache::CacheStats;
use crate::cluster::ClusterStats;
use crate::coalesce::CoalescerStats;
use crate::optimizer::OptimizerStats;
use crate::pool::PoolStats;
use serde::Serialize;

/// One combined snapshot across every component.
///
/// Pool and cluster sections are optional; a host that never constructs a
/// worker pool or cluster supervisor simply leaves them out of the report.
#[derive(Debug, Clone, Serialize)]
pub struct LayerStats {
    pub cache: CacheStats,
    pub coalescer: CoalescerStats,
    pub optimizer: OptimizerStats,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pool: Option<PoolStats>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cluster: Option<ClusterStats>,
}

impl LayerStats {
    /// Combine the core read-path snapshots.
    pub fn new(cache: CacheStats, coalescer: CoalescerStats, optimizer: OptimizerStats) -> Self {
        Self {
            cache,
            coalescer,
            optimizer,
            pool: None,
            cluster: None,
        }
    }

    /// Attach a worker pool snapshot.
    pub fn with_pool(mut self, pool: PoolStats) -> Self {
        self.pool = Some(pool);
        self
    }

    /// Attach a cluster snapshot.
    pub fn with_cluster(mut self, cluster: ClusterStats) -> Self {
        self.cluster = Some(cluster);
        self
    }

    /// Render the snapshot as pretty-printed JSON.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_includes_core_sections() {
        let stats = LayerStats::new(
            CacheStats::new(),
            CoalescerStats::new(),
            OptimizerStats::new(),
        );
        let json = stats.to_json().unwrap();

        assert!(json.contains("\"cache\""));
        assert!(json.contains("\"coalescer\""));
        assert!(json.contains("\"optimizer\""));
        assert!(!json.contains("\"pool\""));
        assert!(!json.contains("\"cluster\""));
    }

    #[test]
    fn test_json_includes_optional_sections_when_attached() {
        let stats = LayerStats::new(
            CacheStats::new(),
            CoalescerStats::new(),
            OptimizerStats::new(),
        )
        .with_pool(PoolStats {
            workers: 4,
            ..Default::default()
        });
        let json = stats.to_json().unwrap();

        assert!(json.contains("\"pool\""));
        assert!(json.contains("\"workers\": 4"));
    }
}
