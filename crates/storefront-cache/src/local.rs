//! Single-tier in-process cache.
//!
//! For data that is cheap to rebuild and never shared between instances
//! (lookup tables, per-instance computed views). No serialization, no L2.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crate::error::{CacheError, CacheResult, validate_key};
use crate::memory::{MemoryRead, MemoryStore};
use crate::metrics::{CacheLevel, CacheMetrics, CacheStats};

pub struct LocalCache {
    store: Arc<MemoryStore>,
    default_ttl: Duration,
    metrics: Arc<CacheMetrics>,
}

impl LocalCache {
    pub fn new(store: Arc<MemoryStore>, default_ttl: Duration) -> Self {
        Self {
            store,
            default_ttl,
            metrics: Arc::new(CacheMetrics::new()),
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<CacheMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn get<T>(&self, key: &str) -> CacheResult<Option<T>>
    where
        T: Clone + Send + Sync + 'static,
    {
        validate_key(key)?;
        match self.store.get::<T>(key) {
            MemoryRead::Hit(value) => {
                self.metrics.record_hit(CacheLevel::L1, key);
                Ok(Some(value))
            }
            read => {
                if matches!(read, MemoryRead::Expired) {
                    self.metrics.record_evictions(CacheLevel::L1, 1);
                }
                self.metrics.record_miss(key);
                Ok(None)
            }
        }
    }

    /// Store a value; `None` uses the default TTL.
    pub fn set<T>(&self, key: &str, value: T, ttl: Option<Duration>) -> CacheResult<()>
    where
        T: Send + Sync + 'static,
    {
        validate_key(key)?;
        let evicted = self
            .store
            .insert(key, value, ttl.unwrap_or(self.default_ttl));
        self.metrics
            .record_evictions(CacheLevel::L1, evicted as u64);
        self.metrics.record_set(CacheLevel::L1, key);
        Ok(())
    }

    /// Remove a key. Returns `true` if it was present.
    pub fn remove(&self, key: &str) -> CacheResult<bool> {
        validate_key(key)?;
        let removed = self.store.remove(key);
        if removed {
            self.metrics.record_evictions(CacheLevel::L1, 1);
        }
        Ok(removed)
    }

    /// Return the cached value, or run `loader`, cache its result and return
    /// it. Loader errors are returned as-is and nothing is cached.
    pub async fn get_or_insert_with<T, E, F, Fut>(
        &self,
        key: &str,
        ttl: Option<Duration>,
        loader: F,
    ) -> Result<T, E>
    where
        T: Clone + Send + Sync + 'static,
        E: From<CacheError>,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        if let Some(value) = self.get::<T>(key)? {
            return Ok(value);
        }
        let value = loader().await?;
        self.set(key, value.clone(), ttl)?;
        Ok(value)
    }

    pub fn stats(&self) -> CacheStats {
        self.metrics.snapshot()
    }

    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }
}
