//! Two-tier associative cache with frequency-driven promotion.

use crate::cache::counter::AccessCounter;
use crate::cache::stats::CacheStats;
use crate::cache::types::CacheConfig;
use regex::Regex;
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tracing::debug;

/// Entry in either tier.
#[derive(Debug, Clone)]
struct CacheEntry<V> {
    value: V,
    /// Absolute expiry; entries past this are never returned
    expires_at: Instant,
    /// Derived from access frequency; protects the entry from eviction
    /// while colder entries exist
    hot: bool,
}

/// Outcome of a single-tier lookup, resolved while the tier lock is held.
enum Lookup<V> {
    Hit(V, bool),
    Expired,
    Miss,
}

/// Two-level cache: a small hot tier with short TTLs in front of a larger
/// standard tier.
///
/// Every write lands in the standard tier; writes for keys that are already
/// known-hot (or explicitly marked for prefetch) are mirrored into the hot
/// tier. Reads check the hot tier first. A standard-tier hit whose key has
/// crossed the configured access threshold copies the value into the hot
/// tier with a fresh short expiry.
///
/// Expired entries are deleted lazily on lookup; [`run_maintenance`] sweeps
/// the rest on the daemon interval. All internal state is guarded by the
/// cache itself, so callers need no external locking. Lookups and writes are
/// O(1) outside of eviction.
///
/// [`run_maintenance`]: TieredCache::run_maintenance
pub struct TieredCache<V> {
    hot: Mutex<HashMap<String, CacheEntry<V>>>,
    standard: Mutex<HashMap<String, CacheEntry<V>>>,
    counter: Mutex<AccessCounter>,
    prefetch: Mutex<HashSet<String>>,
    stats: Mutex<CacheStats>,
    config: CacheConfig,
}

impl<V: Clone> TieredCache<V> {
    /// Create a new tiered cache.
    pub fn new(config: CacheConfig) -> Self {
        Self {
            hot: Mutex::new(HashMap::new()),
            standard: Mutex::new(HashMap::new()),
            counter: Mutex::new(AccessCounter::new(config.counter_cap, config.counter_keep)),
            prefetch: Mutex::new(HashSet::new()),
            stats: Mutex::new(CacheStats::new()),
            config,
        }
    }

    /// Look up a key.
    ///
    /// Checks the hot tier first, then the standard tier. Expired entries are
    /// removed on the way. A standard-tier hit for a key whose access count
    /// has crossed the hot threshold promotes a copy into the hot tier.
    ///
    /// A miss is a normal outcome, not an error.
    pub fn get(&self, key: &str) -> Option<V> {
        let count = self.counter.lock().unwrap().record(key);
        let now = Instant::now();

        // Hot tier first
        let hot_lookup = {
            let mut hot = self.hot.lock().unwrap();
            let state = match hot.get(key) {
                Some(entry) if entry.expires_at > now => Lookup::Hit(entry.value.clone(), false),
                Some(_) => Lookup::Expired,
                None => Lookup::Miss,
            };
            if matches!(state, Lookup::Expired) {
                hot.remove(key);
            }
            state
        };
        match hot_lookup {
            Lookup::Hit(value, _) => {
                self.stats.lock().unwrap().record_hot_hit();
                return Some(value);
            }
            Lookup::Expired => self.stats.lock().unwrap().record_expired(1),
            Lookup::Miss => {}
        }

        // Standard tier
        let standard_lookup = {
            let mut standard = self.standard.lock().unwrap();
            let promote = count >= self.config.hot_threshold;
            let state = match standard.get_mut(key) {
                Some(entry) if entry.expires_at > now => {
                    if promote {
                        entry.hot = true;
                    }
                    Lookup::Hit(entry.value.clone(), promote)
                }
                Some(_) => Lookup::Expired,
                None => Lookup::Miss,
            };
            if matches!(state, Lookup::Expired) {
                standard.remove(key);
            }
            state
        };
        match standard_lookup {
            Lookup::Hit(value, promote) => {
                self.stats.lock().unwrap().record_standard_hit();
                if promote {
                    self.insert_hot(key, value.clone(), true);
                    self.stats.lock().unwrap().record_promotion();
                    debug!(key = %key, count, "promoted key to hot tier");
                }
                Some(value)
            }
            Lookup::Expired => {
                let mut stats = self.stats.lock().unwrap();
                stats.record_expired(1);
                stats.record_miss();
                None
            }
            Lookup::Miss => {
                self.stats.lock().unwrap().record_miss();
                None
            }
        }
    }

    /// Write a value.
    ///
    /// Always lands in the standard tier with `ttl` (or the configured
    /// standard TTL). Keys that are already known-hot or marked for prefetch
    /// are additionally written to the hot tier with the hot TTL.
    pub fn set(&self, key: &str, value: V, ttl: Option<Duration>) {
        let ttl = ttl.unwrap_or(self.config.standard_ttl);
        let known_hot = self.counter.lock().unwrap().count(key) >= self.config.hot_threshold;
        let prefetch = self.prefetch.lock().unwrap().contains(key);

        {
            let mut standard = self.standard.lock().unwrap();
            standard.insert(
                key.to_string(),
                CacheEntry {
                    value: value.clone(),
                    expires_at: Instant::now() + ttl,
                    hot: known_hot,
                },
            );
        }
        if known_hot || prefetch {
            self.insert_hot(key, value, known_hot);
        }
        self.stats.lock().unwrap().record_write();
        self.sync_entry_counts();
    }

    /// Vectorized lookup. Applied key by key; no atomicity across the batch.
    pub fn mget(&self, keys: &[&str]) -> Vec<Option<V>> {
        keys.iter().map(|key| self.get(key)).collect()
    }

    /// Vectorized write. Applied entry by entry; a concurrent reader may
    /// observe a partially applied batch.
    pub fn mset(&self, entries: Vec<(String, V, Option<Duration>)>) {
        for (key, value, ttl) in entries {
            self.set(&key, value, ttl);
        }
    }

    /// Remove a key from both tiers. Returns whether anything was removed.
    pub fn delete(&self, key: &str) -> bool {
        let from_hot = self.hot.lock().unwrap().remove(key).is_some();
        let from_standard = self.standard.lock().unwrap().remove(key).is_some();
        self.counter.lock().unwrap().remove(key);
        self.sync_entry_counts();
        from_hot || from_standard
    }

    /// Remove every key matching a glob-style pattern (`*` matches any run
    /// of characters) from both tiers. Returns the number of distinct keys
    /// removed. Non-matching keys are untouched.
    pub fn invalidate_pattern(&self, pattern: &str) -> usize {
        let regex = match glob_to_regex(pattern) {
            Some(regex) => regex,
            None => return 0,
        };

        let mut removed: HashSet<String> = HashSet::new();
        {
            let mut hot = self.hot.lock().unwrap();
            hot.retain(|key, _| {
                if regex.is_match(key) {
                    removed.insert(key.clone());
                    false
                } else {
                    true
                }
            });
        }
        {
            let mut standard = self.standard.lock().unwrap();
            standard.retain(|key, _| {
                if regex.is_match(key) {
                    removed.insert(key.clone());
                    false
                } else {
                    true
                }
            });
        }
        {
            let mut counter = self.counter.lock().unwrap();
            let mut prefetch = self.prefetch.lock().unwrap();
            for key in &removed {
                counter.remove(key);
                prefetch.remove(key);
            }
        }

        let count = removed.len();
        if count > 0 {
            self.stats.lock().unwrap().record_invalidations(count as u64);
            self.sync_entry_counts();
            debug!(pattern = %pattern, count, "invalidated keys by pattern");
        }
        count
    }

    /// Mark a key so its next write also lands in the hot tier, regardless
    /// of access frequency.
    pub fn mark_prefetch(&self, key: &str) {
        self.prefetch.lock().unwrap().insert(key.to_string());
    }

    /// Remove everything from both tiers and reset the access counter.
    pub fn clear(&self) {
        self.hot.lock().unwrap().clear();
        self.standard.lock().unwrap().clear();
        let config = &self.config;
        *self.counter.lock().unwrap() = AccessCounter::new(config.counter_cap, config.counter_keep);
        self.prefetch.lock().unwrap().clear();
        self.sync_entry_counts();
    }

    /// Whether a key has an unexpired entry in either tier.
    pub fn contains(&self, key: &str) -> bool {
        self.hot_contains(key) || self.standard_contains(key)
    }

    /// Whether a key has an unexpired entry in the hot tier.
    pub fn hot_contains(&self, key: &str) -> bool {
        let hot = self.hot.lock().unwrap();
        hot.get(key).is_some_and(|e| e.expires_at > Instant::now())
    }

    /// Whether a key has an unexpired entry in the standard tier.
    pub fn standard_contains(&self, key: &str) -> bool {
        let standard = self.standard.lock().unwrap();
        standard
            .get(key)
            .is_some_and(|e| e.expires_at > Instant::now())
    }

    /// Total number of stored entries across both tiers (including any not
    /// yet swept expired entries).
    pub fn entry_count(&self) -> usize {
        let hot = self.hot.lock().unwrap().len();
        let standard = self.standard.lock().unwrap().len();
        hot + standard
    }

    /// Snapshot of cache statistics.
    pub fn stats(&self) -> CacheStats {
        self.stats.lock().unwrap().clone()
    }

    /// Interval at which the maintenance daemon should run.
    pub fn maintenance_interval_secs(&self) -> u64 {
        self.config.maintenance_interval_secs
    }

    /// One maintenance pass: sweep expired entries from both tiers and
    /// promote the highest-frequency keys that are not yet in the hot tier.
    ///
    /// Best-effort and advisory; carries no ordering guarantee relative to
    /// foreground reads.
    pub fn run_maintenance(&self) {
        let now = Instant::now();
        let mut expired = 0u64;
        {
            let mut hot = self.hot.lock().unwrap();
            let before = hot.len();
            hot.retain(|_, entry| entry.expires_at > now);
            expired += (before - hot.len()) as u64;
        }
        {
            let mut standard = self.standard.lock().unwrap();
            let before = standard.len();
            standard.retain(|_, entry| entry.expires_at > now);
            expired += (before - standard.len()) as u64;
        }
        if expired > 0 {
            self.stats.lock().unwrap().record_expired(expired);
        }

        // Promote frequent keys that have standard-tier entries but no
        // hot-tier presence yet.
        let candidates = self
            .counter
            .lock()
            .unwrap()
            .top_keys(self.config.hot_capacity, self.config.hot_threshold);
        let mut promoted = 0u64;
        for (key, _) in candidates {
            if self.hot_contains(&key) {
                continue;
            }
            let value = {
                let mut standard = self.standard.lock().unwrap();
                match standard.get_mut(&key) {
                    Some(entry) if entry.expires_at > Instant::now() => {
                        entry.hot = true;
                        Some(entry.value.clone())
                    }
                    _ => None,
                }
            };
            if let Some(value) = value {
                self.insert_hot(&key, value, true);
                promoted += 1;
            }
        }
        if promoted > 0 {
            let mut stats = self.stats.lock().unwrap();
            for _ in 0..promoted {
                stats.record_promotion();
            }
            debug!(promoted, "maintenance pass promoted keys to hot tier");
        }
        self.sync_entry_counts();
    }

    /// Insert into the hot tier, evicting if at capacity.
    ///
    /// The victim is the earliest-expiring entry not flagged hot; when every
    /// entry is hot, the earliest-expiring entry overall is taken instead, so
    /// the choice is deterministic rather than arbitrary.
    fn insert_hot(&self, key: &str, value: V, hot_flag: bool) {
        if self.config.hot_capacity == 0 {
            return;
        }
        let mut hot = self.hot.lock().unwrap();
        if !hot.contains_key(key) && hot.len() >= self.config.hot_capacity {
            let victim = hot
                .iter()
                .filter(|(_, entry)| !entry.hot)
                .min_by_key(|(_, entry)| entry.expires_at)
                .or_else(|| hot.iter().min_by_key(|(_, entry)| entry.expires_at))
                .map(|(victim, _)| victim.clone());
            if let Some(victim) = victim {
                hot.remove(&victim);
                self.stats.lock().unwrap().record_hot_eviction();
                debug!(key = %victim, "evicted entry from hot tier");
            }
        }
        hot.insert(
            key.to_string(),
            CacheEntry {
                value,
                expires_at: Instant::now() + self.config.hot_ttl,
                hot: hot_flag,
            },
        );
    }

    fn sync_entry_counts(&self) {
        let hot = self.hot.lock().unwrap().len();
        let standard = self.standard.lock().unwrap().len();
        self.stats.lock().unwrap().update_entry_counts(hot, standard);
    }
}

/// Compile a glob-style pattern (`*` wildcard) into an anchored regex.
fn glob_to_regex(pattern: &str) -> Option<Regex> {
    let escaped = regex::escape(pattern).replace(r"\*", ".*");
    Regex::new(&format!("^{}$", escaped)).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    fn small_config() -> CacheConfig {
        CacheConfig::default()
            .with_hot_capacity(2)
            .with_hot_threshold(2)
    }

    #[test]
    fn test_set_then_get() {
        let cache: TieredCache<String> = TieredCache::new(CacheConfig::default());
        cache.set("u:1", "alice".to_string(), None);
        assert_eq!(cache.get("u:1"), Some("alice".to_string()));
    }

    #[test]
    fn test_miss_is_none() {
        let cache: TieredCache<String> = TieredCache::new(CacheConfig::default());
        assert_eq!(cache.get("missing"), None);
        assert_eq!(cache.stats().misses, 1);
    }

    #[test]
    fn test_expired_entry_never_returned() {
        let cache: TieredCache<u32> = TieredCache::new(CacheConfig::default());
        cache.set("k", 7, Some(Duration::from_millis(40)));
        assert_eq!(cache.get("k"), Some(7));

        thread::sleep(Duration::from_millis(70));
        assert_eq!(cache.get("k"), None);
        assert!(!cache.contains("k"), "expired entry should be removed lazily");
    }

    #[test]
    fn test_replace_existing_value() {
        let cache: TieredCache<u32> = TieredCache::new(CacheConfig::default());
        cache.set("k", 1, None);
        cache.set("k", 2, None);
        assert_eq!(cache.get("k"), Some(2));
    }

    #[test]
    fn test_mget_mset() {
        let cache: TieredCache<u32> = TieredCache::new(CacheConfig::default());
        cache.mset(vec![
            ("a".to_string(), 1, None),
            ("b".to_string(), 2, None),
        ]);

        let values = cache.mget(&["a", "b", "c"]);
        assert_eq!(values, vec![Some(1), Some(2), None]);
    }

    #[test]
    fn test_delete() {
        let cache: TieredCache<u32> = TieredCache::new(CacheConfig::default());
        cache.set("k", 1, None);
        assert!(cache.delete("k"));
        assert!(!cache.delete("k"));
        assert_eq!(cache.get("k"), None);
    }

    #[test]
    fn test_clear() {
        let cache: TieredCache<u32> = TieredCache::new(CacheConfig::default());
        cache.set("a", 1, None);
        cache.set("b", 2, None);
        cache.clear();
        assert_eq!(cache.entry_count(), 0);
        assert_eq!(cache.get("a"), None);
    }

    #[test]
    fn test_invalidate_pattern_removes_only_matches() {
        let cache: TieredCache<u32> = TieredCache::new(CacheConfig::default());
        cache.set("user:1", 1, None);
        cache.set("user:2", 2, None);
        cache.set("post:1", 3, None);

        let removed = cache.invalidate_pattern("user:*");
        assert_eq!(removed, 2);
        assert_eq!(cache.get("user:1"), None);
        assert_eq!(cache.get("user:2"), None);
        assert_eq!(cache.get("post:1"), Some(3));
    }

    #[test]
    fn test_invalidate_pattern_exact_key() {
        let cache: TieredCache<u32> = TieredCache::new(CacheConfig::default());
        cache.set("user:10", 1, None);
        cache.set("user:1", 2, None);

        // No wildcard: exact match only, "user:10" must survive
        let removed = cache.invalidate_pattern("user:1");
        assert_eq!(removed, 1);
        assert_eq!(cache.get("user:10"), Some(1));
        assert_eq!(cache.get("user:1"), None);
    }

    #[test]
    fn test_promotion_after_threshold() {
        let cache: TieredCache<u32> = TieredCache::new(small_config());
        cache.set("k", 9, None);

        cache.get("k");
        assert!(!cache.hot_contains("k"), "one access is below the threshold");

        cache.get("k");
        assert!(cache.hot_contains("k"), "second access should promote");
        assert_eq!(cache.stats().promotions, 1);
    }

    #[test]
    fn test_set_writes_hot_tier_for_known_hot_key() {
        let cache: TieredCache<u32> = TieredCache::new(small_config());
        cache.set("k", 1, None);
        cache.get("k");
        cache.get("k");

        // Key is hot now; a fresh write should land in both tiers
        cache.set("k", 2, None);
        assert!(cache.hot_contains("k"));
        assert_eq!(cache.get("k"), Some(2));
        assert_eq!(cache.stats().hot_hits, 1);
    }

    #[test]
    fn test_prefetch_marked_key_written_to_hot_tier() {
        let cache: TieredCache<u32> = TieredCache::new(small_config());
        cache.mark_prefetch("k");
        cache.set("k", 1, None);
        assert!(cache.hot_contains("k"));
    }

    #[test]
    fn test_hot_eviction_takes_earliest_expiring_cold_entry() {
        let cache: TieredCache<u32> = TieredCache::new(small_config());
        for key in ["a", "b", "c"] {
            cache.mark_prefetch(key);
        }

        cache.set("a", 1, None);
        thread::sleep(Duration::from_millis(5));
        cache.set("b", 2, None);
        thread::sleep(Duration::from_millis(5));
        cache.set("c", 3, None);

        assert!(!cache.hot_contains("a"), "oldest cold entry should be evicted");
        assert!(cache.hot_contains("b"));
        assert!(cache.hot_contains("c"));
        assert_eq!(cache.stats().hot_evictions, 1);
    }

    #[test]
    fn test_hot_flagged_entry_survives_eviction() {
        let config = CacheConfig::default()
            .with_hot_capacity(2)
            .with_hot_threshold(1);
        let cache: TieredCache<u32> = TieredCache::new(config);

        // "h" becomes hot through access frequency
        cache.set("h", 1, None);
        cache.get("h");
        assert!(cache.hot_contains("h"));

        // "c1" enters the hot tier cold via prefetch
        cache.mark_prefetch("c1");
        cache.set("c1", 2, None);
        thread::sleep(Duration::from_millis(5));

        // Tier is full; inserting "c2" must evict the cold entry, not "h"
        cache.mark_prefetch("c2");
        cache.set("c2", 3, None);

        assert!(cache.hot_contains("h"), "hot entry must not be evicted");
        assert!(!cache.hot_contains("c1"));
        assert!(cache.hot_contains("c2"));
    }

    #[test]
    fn test_maintenance_sweeps_expired_entries() {
        let cache: TieredCache<u32> = TieredCache::new(CacheConfig::default());
        cache.set("a", 1, Some(Duration::from_millis(20)));
        cache.set("b", 2, None);

        thread::sleep(Duration::from_millis(50));
        cache.run_maintenance();

        assert_eq!(cache.entry_count(), 1);
        assert_eq!(cache.get("b"), Some(2));
        assert!(cache.stats().expired_removals >= 1);
    }

    #[test]
    fn test_maintenance_promotes_frequent_keys() {
        // Threshold of 3 so plain gets do not promote inline at count 2
        let config = CacheConfig::default()
            .with_hot_capacity(4)
            .with_hot_threshold(3);
        let cache: TieredCache<u32> = TieredCache::new(config);
        cache.set("k", 1, None);
        cache.get("k");
        cache.get("k");
        cache.get("k");
        // Inline promotion happened at count 3; delete the hot copy to let
        // the maintenance pass do the work
        cache.hot.lock().unwrap().remove("k");
        assert!(!cache.hot_contains("k"));

        cache.run_maintenance();
        assert!(cache.hot_contains("k"));
    }

    #[test]
    fn test_stats_reflect_tier_hits() {
        let cache: TieredCache<u32> = TieredCache::new(small_config());
        cache.set("k", 1, None);
        cache.get("k"); // standard hit
        cache.get("k"); // standard hit + promotion
        cache.get("k"); // hot hit
        cache.get("x"); // miss

        let stats = cache.stats();
        assert_eq!(stats.standard_hits, 2);
        assert_eq!(stats.hot_hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.overall_hit_rate(), 0.75);
    }

    #[test]
    fn test_glob_to_regex_anchors() {
        let regex = glob_to_regex("user:*").unwrap();
        assert!(regex.is_match("user:1"));
        assert!(regex.is_match("user:"));
        assert!(!regex.is_match("xuser:1"));

        let exact = glob_to_regex("a.b").unwrap();
        assert!(exact.is_match("a.b"));
        assert!(!exact.is_match("aXb"), "dot must be escaped");
    }

    #[test]
    fn test_glob_to_regex_backslash_stays_literal() {
        // A backslash in the key is an ordinary character; the star next to
        // it is still the wildcard
        let regex = glob_to_regex(r"a\*b").unwrap();
        assert!(regex.is_match(r"a\b"));
        assert!(regex.is_match(r"a\zzb"));
        assert!(!regex.is_match("azzb"), "the backslash must be matched literally");
        assert!(!regex.is_match(r"x\zzb"));

        let trailing = glob_to_regex(r"tmp\*").unwrap();
        assert!(trailing.is_match(r"tmp\one"));
        assert!(!trailing.is_match("tmpone"));
    }
}
