//! The optimizer itself and its batch loader.

use crate::cache::TieredCache;
use crate::coalesce::{CoalesceError, KeyedLoader, RequestCoalescer};
use crate::optimizer::stats::OptimizerStats;
use crate::optimizer::types::{BatchQueryOptions, OptimizerConfig, QueryError, QueryOptions};
use std::fmt::Display;
use std::future::Future;
use std::hash::Hash;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, warn};

/// Read-path front door combining the tiered cache and the request
/// coalescer.
///
/// A query runs: consult the cache, and on a miss run the fetcher (coalesced
/// with any concurrent identical fetch) under a wait timeout, then populate
/// the cache with a successful result. Errors and timeouts are never cached.
///
/// The timeout abandons the wait only. The underlying fetch keeps running to
/// completion so other coalesced waiters still get their result; a result
/// arriving after this caller gave up is discarded.
pub struct DataAccessOptimizer<V> {
    cache: Arc<TieredCache<V>>,
    coalescer: RequestCoalescer<V>,
    stats: Arc<Mutex<OptimizerStats>>,
}

impl<V> DataAccessOptimizer<V>
where
    V: Clone + Send + Sync + 'static,
{
    pub fn new(config: OptimizerConfig) -> Self {
        Self {
            cache: Arc::new(TieredCache::new(config.cache)),
            coalescer: RequestCoalescer::new(config.batch_window),
            stats: Arc::new(Mutex::new(OptimizerStats::new())),
        }
    }

    /// The underlying tiered cache.
    pub fn cache(&self) -> &Arc<TieredCache<V>> {
        &self.cache
    }

    /// The underlying request coalescer.
    pub fn coalescer(&self) -> &RequestCoalescer<V> {
        &self.coalescer
    }

    /// Fetch the value for `key`, preferring the cache.
    ///
    /// Returns [`QueryError::TimedOut`] when the fetcher takes longer than
    /// `options.timeout`; the fetch itself is not cancelled.
    pub async fn query<F, Fut, E>(
        &self,
        key: &str,
        fetcher: F,
        options: QueryOptions,
    ) -> Result<V, QueryError>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<V, E>> + Send + 'static,
        E: Display + Send + 'static,
    {
        if options.cache {
            if let Some(value) = self.cache.get(key) {
                self.stats.lock().unwrap().record_hit();
                debug!(key, "query served from cache");
                return Ok(value);
            }
        }
        self.stats.lock().unwrap().record_miss();

        let result = if options.coalesce {
            match tokio::time::timeout(options.timeout, self.coalescer.coalesce(key, fetcher))
                .await
            {
                Ok(outcome) => outcome.map_err(QueryError::from),
                Err(_) => Err(QueryError::TimedOut),
            }
        } else {
            // Detached task so an abandoned wait does not stop the fetch
            let handle = tokio::spawn(fetcher());
            match tokio::time::timeout(options.timeout, handle).await {
                Ok(Ok(Ok(value))) => Ok(value),
                Ok(Ok(Err(err))) => Err(QueryError::Fetch(err.to_string())),
                Ok(Err(_)) => Err(QueryError::Fetch("fetch task panicked".to_string())),
                Err(_) => Err(QueryError::TimedOut),
            }
        };

        match result {
            Ok(value) => {
                if options.cache {
                    self.cache.set(key, value.clone(), options.cache_ttl);
                }
                Ok(value)
            }
            Err(QueryError::TimedOut) => {
                self.stats.lock().unwrap().record_timeout();
                warn!(key, timeout = ?options.timeout, "query abandoned at timeout");
                Err(QueryError::TimedOut)
            }
            Err(err) => {
                self.stats.lock().unwrap().record_fetch_failure();
                Err(err)
            }
        }
    }

    /// Build a batch loader: all distinct keys requested within one
    /// coalescing window go to `batch_fn` as a single call, and each
    /// resolved value is cached under `key_prefix:key`.
    pub fn batch_query<K, F, Fut, E>(
        &self,
        key_prefix: impl Into<String>,
        batch_fn: F,
        options: BatchQueryOptions,
    ) -> BatchQuery<K, V>
    where
        K: Eq + Hash + Clone + Send + Display + 'static,
        F: Fn(Vec<K>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Vec<V>, E>> + Send + 'static,
        E: Display,
    {
        let loader = self.coalescer.keyed_loader(move |keys| {
            let fut = batch_fn(keys);
            async move { fut.await.map_err(CoalesceError::operation) }
        });
        BatchQuery {
            loader,
            cache: Arc::clone(&self.cache),
            key_prefix: key_prefix.into(),
            cache_enabled: options.cache,
            cache_ttl: options.cache_ttl,
            stats: Arc::clone(&self.stats),
        }
    }

    /// Snapshot of optimizer statistics.
    pub fn stats(&self) -> OptimizerStats {
        self.stats.lock().unwrap().clone()
    }
}

/// A keyed batch loader with per-key caching.
///
/// Built by [`DataAccessOptimizer::batch_query`]. Cloneable; clones share
/// the same pending batch, cache, and statistics.
pub struct BatchQuery<K, V> {
    loader: KeyedLoader<K, V>,
    cache: Arc<TieredCache<V>>,
    key_prefix: String,
    cache_enabled: bool,
    cache_ttl: Option<Duration>,
    stats: Arc<Mutex<OptimizerStats>>,
}

impl<K, V> Clone for BatchQuery<K, V> {
    fn clone(&self) -> Self {
        Self {
            loader: self.loader.clone(),
            cache: Arc::clone(&self.cache),
            key_prefix: self.key_prefix.clone(),
            cache_enabled: self.cache_enabled,
            cache_ttl: self.cache_ttl,
            stats: Arc::clone(&self.stats),
        }
    }
}

impl<K, V> BatchQuery<K, V>
where
    K: Eq + Hash + Clone + Send + Display + 'static,
    V: Clone + Send + Sync + 'static,
{
    /// Load one key, preferring the cache, batching the rest.
    pub async fn load(&self, key: K) -> Result<V, QueryError> {
        let cache_key = format!("{}:{}", self.key_prefix, key);
        if self.cache_enabled {
            if let Some(value) = self.cache.get(&cache_key) {
                self.stats.lock().unwrap().record_hit();
                return Ok(value);
            }
        }
        self.stats.lock().unwrap().record_miss();

        match self.loader.load(key).await {
            Ok(value) => {
                if self.cache_enabled {
                    self.cache.set(&cache_key, value.clone(), self.cache_ttl);
                }
                Ok(value)
            }
            Err(err) => {
                self.stats.lock().unwrap().record_fetch_failure();
                Err(QueryError::Coalesce(err))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::CacheConfig;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn fast_optimizer() -> DataAccessOptimizer<String> {
        DataAccessOptimizer::new(
            OptimizerConfig::default().with_batch_window(Duration::from_millis(10)),
        )
    }

    fn counting_fetcher(
        counter: Arc<AtomicUsize>,
        value: &str,
    ) -> impl FnOnce() -> std::pin::Pin<
        Box<dyn Future<Output = Result<String, String>> + Send>,
    > {
        let value = value.to_string();
        move || {
            Box::pin(async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(value)
            })
        }
    }

    #[tokio::test]
    async fn test_second_query_is_a_cache_hit() {
        let optimizer = fast_optimizer();
        let counter = Arc::new(AtomicUsize::new(0));

        let first = optimizer
            .query("user:1", counting_fetcher(counter.clone(), "alice"), QueryOptions::default())
            .await
            .unwrap();
        let second = optimizer
            .query("user:1", counting_fetcher(counter.clone(), "bob"), QueryOptions::default())
            .await
            .unwrap();

        assert_eq!(first, "alice");
        assert_eq!(second, "alice", "second query must come from the cache");
        assert_eq!(counter.load(Ordering::SeqCst), 1);

        let stats = optimizer.stats();
        assert_eq!(stats.cache_hits, 1);
        assert_eq!(stats.cache_misses, 1);
    }

    #[tokio::test]
    async fn test_cache_disabled_fetches_every_time() {
        let optimizer = fast_optimizer();
        let counter = Arc::new(AtomicUsize::new(0));
        let options = QueryOptions::default().with_cache(false);

        optimizer
            .query("k", counting_fetcher(counter.clone(), "v"), options.clone())
            .await
            .unwrap();
        optimizer
            .query("k", counting_fetcher(counter.clone(), "v"), options)
            .await
            .unwrap();

        assert_eq!(counter.load(Ordering::SeqCst), 2);
        assert!(!optimizer.cache().contains("k"));
    }

    #[tokio::test]
    async fn test_concurrent_queries_fetch_once() {
        let optimizer = Arc::new(fast_optimizer());
        let counter = Arc::new(AtomicUsize::new(0));

        let calls: Vec<_> = (0..6)
            .map(|_| {
                let optimizer = optimizer.clone();
                let counter = counter.clone();
                tokio::spawn(async move {
                    optimizer
                        .query("shared", counting_fetcher(counter, "v"), QueryOptions::default())
                        .await
                })
            })
            .collect();
        for call in calls {
            assert_eq!(call.await.unwrap().unwrap(), "v");
        }

        assert_eq!(counter.load(Ordering::SeqCst), 1, "fetch must run exactly once");
    }

    #[tokio::test]
    async fn test_timeout_abandons_wait_without_cancelling_fetch() {
        let optimizer = fast_optimizer();
        let counter = Arc::new(AtomicUsize::new(0));
        let fetch_counter = counter.clone();

        let result = optimizer
            .query(
                "slow",
                move || async move {
                    tokio::time::sleep(Duration::from_millis(100)).await;
                    fetch_counter.fetch_add(1, Ordering::SeqCst);
                    Ok::<String, String>("late".to_string())
                },
                QueryOptions::default().with_timeout(Duration::from_millis(30)),
            )
            .await;

        assert_eq!(result, Err(QueryError::TimedOut));
        assert_eq!(optimizer.stats().timeouts, 1);

        // The fetch still runs to completion, but its late result is
        // discarded and never cached
        tokio::time::sleep(Duration::from_millis(150)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 1);
        assert!(!optimizer.cache().contains("slow"));
    }

    #[tokio::test]
    async fn test_fetch_error_is_not_cached() {
        let optimizer = fast_optimizer();
        let counter = Arc::new(AtomicUsize::new(0));

        let failing = {
            let counter = counter.clone();
            move || {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Err::<String, String>("backend down".to_string())
                }
            }
        };

        let result = optimizer
            .query("k", failing.clone(), QueryOptions::default())
            .await;
        assert_eq!(
            result,
            Err(QueryError::Coalesce(CoalesceError::Operation(
                "backend down".to_string()
            )))
        );
        assert!(!optimizer.cache().contains("k"));

        // The error was not cached, so the next query fetches again
        let _ = optimizer.query("k", failing, QueryOptions::default()).await;
        assert_eq!(counter.load(Ordering::SeqCst), 2);
        assert_eq!(optimizer.stats().fetch_failures, 2);
    }

    #[tokio::test]
    async fn test_uncoalesced_query_fetches_and_caches() {
        let optimizer = fast_optimizer();
        let options = QueryOptions::default().with_coalesce(false);

        // The fetch runs on a detached task; a custom error type must be
        // allowed to cross into it
        #[derive(Debug)]
        struct FetchFailed;
        impl std::fmt::Display for FetchFailed {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "fetch failed")
            }
        }

        let value = optimizer
            .query(
                "k",
                || async { Ok::<String, FetchFailed>("v".to_string()) },
                options.clone(),
            )
            .await
            .unwrap();
        assert_eq!(value, "v");
        assert!(optimizer.cache().contains("k"));

        let failed = optimizer
            .query(
                "bad",
                || async { Err::<String, FetchFailed>(FetchFailed) },
                options,
            )
            .await;
        assert_eq!(failed, Err(QueryError::Fetch("fetch failed".to_string())));
    }

    #[tokio::test]
    async fn test_uncoalesced_query_times_out() {
        let optimizer = fast_optimizer();
        let options = QueryOptions::default()
            .with_coalesce(false)
            .with_timeout(Duration::from_millis(20));

        let result = optimizer
            .query(
                "slow",
                || async {
                    tokio::time::sleep(Duration::from_secs(5)).await;
                    Ok::<String, String>("never".to_string())
                },
                options,
            )
            .await;

        assert_eq!(result, Err(QueryError::TimedOut));
    }

    #[tokio::test]
    async fn test_batch_query_batches_and_caches() {
        let optimizer = fast_optimizer();
        let batches = Arc::new(AtomicUsize::new(0));
        let batch_counter = batches.clone();

        let loader = optimizer.batch_query(
            "user",
            move |keys: Vec<u32>| {
                let batch_counter = batch_counter.clone();
                async move {
                    batch_counter.fetch_add(1, Ordering::SeqCst);
                    Ok::<_, String>(keys.iter().map(|k| format!("user-{k}")).collect())
                }
            },
            BatchQueryOptions::default(),
        );

        let (a, b) = tokio::join!(loader.load(1), loader.load(2));
        assert_eq!(a.unwrap(), "user-1");
        assert_eq!(b.unwrap(), "user-2");
        assert_eq!(batches.load(Ordering::SeqCst), 1, "one batch for both keys");

        // Resolved values land in the cache under derived keys
        assert_eq!(optimizer.cache().get("user:1"), Some("user-1".to_string()));
        assert_eq!(optimizer.cache().get("user:2"), Some("user-2".to_string()));

        // A repeat load is a pure cache hit
        assert_eq!(loader.load(1).await.unwrap(), "user-1");
        assert_eq!(batches.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_batch_query_error_fans_out() {
        let optimizer = fast_optimizer();
        let loader = optimizer.batch_query(
            "user",
            |_keys: Vec<u32>| async { Err::<Vec<String>, String>("db offline".to_string()) },
            BatchQueryOptions::default(),
        );

        let (a, b) = tokio::join!(loader.load(1), loader.load(2));
        assert!(matches!(a, Err(QueryError::Coalesce(_))));
        assert!(matches!(b, Err(QueryError::Coalesce(_))));
        assert!(!optimizer.cache().contains("user:1"));
    }

    #[tokio::test]
    async fn test_cache_ttl_option_expires_entry() {
        let optimizer = fast_optimizer();
        let options = QueryOptions::default().with_cache_ttl(Duration::from_millis(30));

        optimizer
            .query("k", || async { Ok::<String, String>("v".to_string()) }, options)
            .await
            .unwrap();
        assert!(optimizer.cache().contains("k"));

        tokio::time::sleep(Duration::from_millis(60)).await;
        assert_eq!(optimizer.cache().get("k"), None);
    }

    #[test]
    fn test_default_config() {
        let config = OptimizerConfig::default();
        assert_eq!(config.batch_window, Duration::from_millis(50));
        assert_eq!(config.cache.hot_capacity, CacheConfig::default().hot_capacity);
    }
}
