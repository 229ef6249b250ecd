//! Access frequency tracking for hotness decisions.

use std::collections::HashMap;

/// Bounded map from key to access count.
///
/// Used only to decide whether a key is hot enough for promotion into the
/// hot tier. When the map grows past its cap it is pruned to the top-N most
/// accessed keys, so counts for cold keys can be lost. That is a deliberate,
/// lossy approximation; correctness never depends on this structure.
#[derive(Debug)]
pub struct AccessCounter {
    counts: HashMap<String, u64>,
    /// Prune once more than this many keys are tracked
    cap: usize,
    /// Number of keys retained by a prune
    keep: usize,
}

impl AccessCounter {
    /// Create a counter that prunes down to `keep` keys once `cap` is exceeded.
    pub fn new(cap: usize, keep: usize) -> Self {
        Self {
            counts: HashMap::new(),
            cap,
            keep,
        }
    }

    /// Record one access and return the new count for the key.
    ///
    /// Prunes the map first if it is over capacity, so the map never holds
    /// more than `cap + 1` keys.
    pub fn record(&mut self, key: &str) -> u64 {
        if self.counts.len() > self.cap {
            self.prune();
        }
        let count = self.counts.entry(key.to_string()).or_insert(0);
        *count += 1;
        *count
    }

    /// Current count for a key. Zero if the key is untracked (possibly
    /// because a prune dropped it).
    pub fn count(&self, key: &str) -> u64 {
        self.counts.get(key).copied().unwrap_or(0)
    }

    /// Number of keys currently tracked.
    pub fn len(&self) -> usize {
        self.counts.len()
    }

    /// Whether any keys are tracked.
    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    /// Forget a key entirely.
    pub fn remove(&mut self, key: &str) {
        self.counts.remove(key);
    }

    /// The `n` most accessed keys with counts of at least `min_count`,
    /// ordered by descending count.
    pub fn top_keys(&self, n: usize, min_count: u64) -> Vec<(String, u64)> {
        let mut entries: Vec<(String, u64)> = self
            .counts
            .iter()
            .filter(|(_, &count)| count >= min_count)
            .map(|(k, &count)| (k.clone(), count))
            .collect();
        entries.sort_by(|a, b| b.1.cmp(&a.1));
        entries.truncate(n);
        entries
    }

    /// Drop everything but the top `keep` keys by count.
    fn prune(&mut self) {
        let survivors = self.top_keys(self.keep, 0);
        self.counts = survivors.into_iter().collect();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_increments() {
        let mut counter = AccessCounter::new(100, 10);
        assert_eq!(counter.record("a"), 1);
        assert_eq!(counter.record("a"), 2);
        assert_eq!(counter.record("b"), 1);
        assert_eq!(counter.count("a"), 2);
        assert_eq!(counter.count("b"), 1);
    }

    #[test]
    fn test_count_for_unknown_key_is_zero() {
        let counter = AccessCounter::new(100, 10);
        assert_eq!(counter.count("missing"), 0);
    }

    #[test]
    fn test_remove() {
        let mut counter = AccessCounter::new(100, 10);
        counter.record("a");
        counter.remove("a");
        assert_eq!(counter.count("a"), 0);
        assert!(counter.is_empty());
    }

    #[test]
    fn test_prune_keeps_top_keys() {
        let mut counter = AccessCounter::new(5, 2);

        // "hot1" and "hot2" are accessed far more than the rest
        for _ in 0..10 {
            counter.record("hot1");
        }
        for _ in 0..8 {
            counter.record("hot2");
        }
        for i in 0..4 {
            counter.record(&format!("cold{}", i));
        }

        // Over cap now; next record triggers a prune first
        assert!(counter.len() > 5);
        counter.record("trigger");

        assert_eq!(counter.count("hot1"), 10);
        assert_eq!(counter.count("hot2"), 8);
        assert_eq!(counter.count("cold0"), 0, "cold keys should be pruned");
        assert!(counter.len() <= 3);
    }

    #[test]
    fn test_top_keys_ordering_and_threshold() {
        let mut counter = AccessCounter::new(100, 10);
        for _ in 0..5 {
            counter.record("a");
        }
        for _ in 0..3 {
            counter.record("b");
        }
        counter.record("c");

        let top = counter.top_keys(10, 2);
        assert_eq!(top.len(), 2);
        assert_eq!(top[0], ("a".to_string(), 5));
        assert_eq!(top[1], ("b".to_string(), 3));
    }

    #[test]
    fn test_top_keys_truncates() {
        let mut counter = AccessCounter::new(100, 10);
        for i in 0..10 {
            counter.record(&format!("k{}", i));
        }
        assert_eq!(counter.top_keys(3, 0).len(), 3);
    }
}
