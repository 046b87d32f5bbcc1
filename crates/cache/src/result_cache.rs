//! Bounded LRU cache of query results keyed by canonical query key

use crate::statistics::{CacheStats, Counters};
use dgrep_core::{Error, QueryResult, Result};
use lru::LruCache;
use parking_lot::Mutex;
use std::future::Future;
use std::num::NonZeroUsize;
use std::time::Instant;

/// Least-recently-used cache shared by local executions and inbound handlers.
///
/// The lock is only held for the lookup or the insertion itself, never while a
/// result is being computed, so callers working on unrelated keys only contend
/// for those short critical sections. Two callers missing on the same key at
/// the same time may both compute; the later insertion wins.
pub struct ResultCache {
    entries: Mutex<LruCache<String, QueryResult>>,
    capacity: NonZeroUsize,
    counters: Counters,
}

impl ResultCache {
    /// Create a cache holding at most `capacity` results.
    pub fn new(capacity: usize) -> Result<Self> {
        let capacity = NonZeroUsize::new(capacity)
            .ok_or_else(|| Error::configuration("cache capacity must be greater than zero"))?;
        Ok(Self {
            entries: Mutex::new(LruCache::new(capacity)),
            capacity,
            counters: Counters::default(),
        })
    }

    /// Look up a result, marking it most-recently-used on a hit.
    ///
    /// A miss leaves the recency order untouched.
    pub fn get(&self, key: &str) -> Option<QueryResult> {
        let found = self.entries.lock().get(key).cloned();
        match found {
            Some(result) => {
                self.counters.record_hit();
                tracing::debug!(key = %key, "cache_hit");
                Some(result)
            }
            None => {
                self.counters.record_miss();
                tracing::debug!(key = %key, "cache_miss");
                None
            }
        }
    }

    /// Insert or overwrite `key`, marking it most-recently-used.
    ///
    /// Evicts the least-recently-used entry when the cache is full.
    pub fn put(&self, key: impl Into<String>, result: QueryResult) {
        let key = key.into();
        let evicted = self.entries.lock().push(key.clone(), result);
        if let Some((evicted_key, _)) = evicted {
            // `push` also hands back the old value when overwriting the same key
            if evicted_key != key {
                self.counters.record_eviction();
                tracing::debug!(key = %evicted_key, "cache_evict");
            }
        }
    }

    /// Return the cached result for `key`, or compute, store and return a fresh one.
    ///
    /// On a hit the returned result carries the cache-retrieval latency in place
    /// of the stored execution duration.
    pub async fn get_or_compute<F, Fut>(&self, key: &str, compute: F) -> QueryResult
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = QueryResult>,
    {
        let started = Instant::now();
        if let Some(hit) = self.get(key) {
            return hit.with_duration(started.elapsed());
        }

        let result = compute().await;
        self.put(key, result.clone());
        result
    }

    /// Fallible variant of [`get_or_compute`](Self::get_or_compute).
    ///
    /// Errors from `compute` are returned as-is and nothing is cached.
    pub async fn try_get_or_compute<F, Fut, E>(
        &self,
        key: &str,
        compute: F,
    ) -> std::result::Result<QueryResult, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = std::result::Result<QueryResult, E>>,
    {
        let started = Instant::now();
        if let Some(hit) = self.get(key) {
            return Ok(hit.with_duration(started.elapsed()));
        }

        let result = compute().await?;
        self.put(key, result.clone());
        Ok(result)
    }

    /// Check for a key without touching recency or statistics.
    pub fn contains(&self, key: &str) -> bool {
        self.entries.lock().contains(key)
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity.get()
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
    }

    pub fn stats(&self) -> CacheStats {
        self.counters.snapshot(self.len(), self.capacity())
    }
}

impl std::fmt::Debug for ResultCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResultCache")
            .field("len", &self.len())
            .field("capacity", &self.capacity)
            .finish()
    }
}
