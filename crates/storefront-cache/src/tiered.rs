//! Two-tier cache service: L1 (in-process) + L2 (distributed).
//!
//! ## Lookup order
//!
//! ```text
//! get(key) → L1 (typed, DashMap) → L2 (bytes, Redis/memory) → miss
//!                                      ↓ hit
//!                          decode + promote into L1 (promotion TTL)
//! ```
//!
//! ## Failure policy
//!
//! - Reads never fail because of the cache: L2 errors, undecodable payloads
//!   and cancellation are misses. Only an invalid key is reported.
//! - Writes are L2 first, then L1. If L2 fails or the caller cancels, the
//!   error is returned and L1 is left untouched, so no tier holds a value the
//!   other tier refused.
//! - Removals clear L1 before awaiting L2.

use std::collections::BTreeSet;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde::{Serialize, de::DeserializeOwned};
use tokio_util::sync::CancellationToken;
use tracing::Instrument;
use tracing::field::Empty;

use crate::codec::SerializationFormat;
use crate::config::CacheConfig;
use crate::distributed::DynDistributedStore;
use crate::entry::CacheEntryInfo;
use crate::error::{CacheError, CacheResult, validate_key};
use crate::index::CacheKeyIndex;
use crate::memory::{MemoryRead, MemoryStore};
use crate::metrics::{CacheLevel, CacheMetrics, CacheStats};

/// TTL and encoding policy applied by [`TieredCache`].
#[derive(Debug, Clone)]
pub struct CachePolicy {
    pub l1_ttl: Duration,
    pub l2_ttl: Duration,
    pub promotion_ttl: Duration,
    pub format: SerializationFormat,
    pub index_all_keys: bool,
}

impl Default for CachePolicy {
    fn default() -> Self {
        Self::from(&CacheConfig::default())
    }
}

impl From<&CacheConfig> for CachePolicy {
    fn from(config: &CacheConfig) -> Self {
        Self {
            l1_ttl: config.l1_ttl(),
            l2_ttl: config.l2_ttl(),
            promotion_ttl: config.promotion_ttl(),
            format: config.format,
            index_all_keys: config.index_all_keys,
        }
    }
}

/// A cache hit and the tier that served it.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheHit<T> {
    pub value: T,
    pub level: CacheLevel,
}

/// Single entry point for cache reads, writes and invalidation.
pub struct TieredCache {
    memory: Arc<MemoryStore>,
    distributed: DynDistributedStore,
    index: Arc<CacheKeyIndex>,
    metrics: Arc<CacheMetrics>,
    policy: CachePolicy,
}

impl TieredCache {
    pub fn new(
        memory: Arc<MemoryStore>,
        distributed: DynDistributedStore,
        policy: CachePolicy,
    ) -> Self {
        Self {
            memory,
            distributed,
            index: Arc::new(CacheKeyIndex::new()),
            metrics: Arc::new(CacheMetrics::new()),
            policy,
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<CacheMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn with_index(mut self, index: Arc<CacheKeyIndex>) -> Self {
        self.index = index;
        self
    }

    pub fn policy(&self) -> &CachePolicy {
        &self.policy
    }

    pub fn memory(&self) -> &Arc<MemoryStore> {
        &self.memory
    }

    pub fn distributed(&self) -> &DynDistributedStore {
        &self.distributed
    }

    pub fn key_index(&self) -> &Arc<CacheKeyIndex> {
        &self.index
    }

    pub fn metrics(&self) -> &Arc<CacheMetrics> {
        &self.metrics
    }

    pub fn stats(&self) -> CacheStats {
        self.metrics.snapshot()
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Get a value, L1 first then L2.
    pub async fn get<T>(&self, key: &str) -> CacheResult<Option<T>>
    where
        T: DeserializeOwned + Clone + Send + Sync + 'static,
    {
        Ok(self.lookup(key).await?.map(|hit| hit.value))
    }

    pub async fn get_cancellable<T>(
        &self,
        key: &str,
        cancel: &CancellationToken,
    ) -> CacheResult<Option<T>>
    where
        T: DeserializeOwned + Clone + Send + Sync + 'static,
    {
        Ok(self
            .lookup_cancellable(key, cancel)
            .await?
            .map(|hit| hit.value))
    }

    /// Like [`get`](Self::get), also reporting which tier served the hit.
    pub async fn lookup<T>(&self, key: &str) -> CacheResult<Option<CacheHit<T>>>
    where
        T: DeserializeOwned + Clone + Send + Sync + 'static,
    {
        self.lookup_cancellable(key, &CancellationToken::new()).await
    }

    pub async fn lookup_cancellable<T>(
        &self,
        key: &str,
        cancel: &CancellationToken,
    ) -> CacheResult<Option<CacheHit<T>>>
    where
        T: DeserializeOwned + Clone + Send + Sync + 'static,
    {
        validate_key(key)?;
        let span = tracing::debug_span!(
            "cache.get",
            cache.key = %key,
            cache.level = Empty,
            cache.hit = Empty,
            cache.error = Empty
        );
        let hit = self
            .lookup_inner(key, cancel, &span)
            .instrument(span.clone())
            .await;

        match &hit {
            Some(hit) => {
                span.record("cache.hit", true);
                span.record("cache.level", hit.level.as_str());
                self.metrics.record_hit(hit.level, key);
            }
            None => {
                span.record("cache.hit", false);
                span.record("cache.level", CacheLevel::Both.as_str());
                self.metrics.record_miss(key);
            }
        }
        Ok(hit)
    }

    async fn lookup_inner<T>(
        &self,
        key: &str,
        cancel: &CancellationToken,
        span: &tracing::Span,
    ) -> Option<CacheHit<T>>
    where
        T: DeserializeOwned + Clone + Send + Sync + 'static,
    {
        match self.memory.get::<T>(key) {
            MemoryRead::Hit(value) => {
                tracing::debug!(key = %key, "cache hit (L1)");
                return Some(CacheHit {
                    value,
                    level: CacheLevel::L1,
                });
            }
            MemoryRead::Expired => {
                self.metrics.record_evictions(CacheLevel::L1, 1);
            }
            MemoryRead::TypeMismatch => {
                tracing::debug!(key = %key, "L1 entry holds a different type, checking L2");
            }
            MemoryRead::Absent => {}
        }

        let bytes = match cancellable(cancel, self.distributed.get(key)).await {
            None => {
                tracing::debug!(key = %key, "cache get cancelled");
                return None;
            }
            Some(Ok(Some(bytes))) => bytes,
            Some(Ok(None)) => {
                tracing::debug!(key = %key, "cache miss");
                return None;
            }
            Some(Err(e)) => {
                tracing::warn!(key = %key, error = %e, "L2 GET error, treating as miss");
                span.record("cache.error", tracing::field::display(&e));
                self.metrics.record_error(CacheLevel::L2, key);
                return None;
            }
        };

        match self.policy.format.decode::<T>(&bytes) {
            Ok(value) => {
                tracing::debug!(key = %key, "cache hit (L2)");
                let evicted =
                    self.memory
                        .insert(key, value.clone(), self.policy.promotion_ttl);
                self.metrics
                    .record_evictions(CacheLevel::L1, evicted as u64);
                Some(CacheHit {
                    value,
                    level: CacheLevel::L2,
                })
            }
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "Failed to decode cached value, treating as miss");
                span.record("cache.error", tracing::field::display(&e));
                self.metrics.record_error(CacheLevel::L2, key);
                if let Err(e) = self.distributed.remove(key).await {
                    tracing::debug!(key = %key, error = %e, "failed to drop undecodable L2 entry");
                }
                None
            }
        }
    }

    /// Returns `true` if the key is present and unexpired in either tier.
    /// Does not promote.
    pub async fn exists(&self, key: &str) -> CacheResult<bool> {
        self.exists_cancellable(key, &CancellationToken::new())
            .await
    }

    pub async fn exists_cancellable(
        &self,
        key: &str,
        cancel: &CancellationToken,
    ) -> CacheResult<bool> {
        validate_key(key)?;
        if self.memory.contains(key) {
            return Ok(true);
        }
        match cancellable(cancel, self.distributed.exists(key)).await {
            Some(Ok(exists)) => Ok(exists),
            Some(Err(e)) => {
                tracing::warn!(key = %key, error = %e, "L2 EXISTS error, treating as absent");
                self.metrics.record_error(CacheLevel::L2, key);
                Ok(false)
            }
            None => Ok(false),
        }
    }

    // =========================================================================
    // Writes
    // =========================================================================

    /// Write a value to both tiers. `None` TTLs use the policy defaults.
    pub async fn set<T>(
        &self,
        key: &str,
        value: T,
        l1_ttl: Option<Duration>,
        l2_ttl: Option<Duration>,
    ) -> CacheResult<()>
    where
        T: Serialize + Send + Sync + 'static,
    {
        self.set_cancellable(key, value, l1_ttl, l2_ttl, &CancellationToken::new())
            .await
    }

    pub async fn set_cancellable<T>(
        &self,
        key: &str,
        value: T,
        l1_ttl: Option<Duration>,
        l2_ttl: Option<Duration>,
        cancel: &CancellationToken,
    ) -> CacheResult<()>
    where
        T: Serialize + Send + Sync + 'static,
    {
        validate_key(key)?;
        let l1_ttl = l1_ttl.unwrap_or(self.policy.l1_ttl);
        let l2_ttl = l2_ttl.unwrap_or(self.policy.l2_ttl);
        if l1_ttl > l2_ttl {
            tracing::warn!(
                key = %key,
                l1_ttl_ms = l1_ttl.as_millis() as u64,
                l2_ttl_ms = l2_ttl.as_millis() as u64,
                "L1 TTL exceeds L2 TTL"
            );
        }

        let bytes = self.policy.format.encode(&value)?;
        let span = tracing::debug_span!(
            "cache.set",
            cache.key = %key,
            cache.level = CacheLevel::Both.as_str(),
            cache.error = Empty
        );

        async {
            match cancellable(cancel, self.distributed.set(key, bytes, l2_ttl)).await {
                None => {
                    tracing::debug!(key = %key, "cache set cancelled before L2 completed");
                    return Err(CacheError::Cancelled);
                }
                Some(Err(e)) => {
                    tracing::warn!(key = %key, error = %e, "L2 SET error");
                    tracing::Span::current().record("cache.error", tracing::field::display(&e));
                    self.metrics.record_error(CacheLevel::L2, key);
                    return Err(e);
                }
                Some(Ok(())) => self.metrics.record_set(CacheLevel::L2, key),
            }

            let evicted = self.memory.insert(key, value, l1_ttl);
            self.metrics
                .record_evictions(CacheLevel::L1, evicted as u64);
            self.metrics.record_set(CacheLevel::L1, key);

            if self.policy.index_all_keys {
                self.index.track(key);
            }

            tracing::debug!(key = %key, "cache set (L1+L2)");
            Ok(())
        }
        .instrument(span)
        .await
    }

    // =========================================================================
    // Invalidation
    // =========================================================================

    /// Remove a key from both tiers. Absence is not an error.
    pub async fn remove(&self, key: &str) -> CacheResult<()> {
        self.remove_cancellable(key, &CancellationToken::new())
            .await
    }

    pub async fn remove_cancellable(
        &self,
        key: &str,
        cancel: &CancellationToken,
    ) -> CacheResult<()> {
        validate_key(key)?;
        let span = tracing::debug_span!(
            "cache.remove",
            cache.key = %key,
            cache.level = CacheLevel::Both.as_str(),
            cache.error = Empty
        );
        self.remove_both(key, cancel).instrument(span).await
    }

    async fn remove_both(&self, key: &str, cancel: &CancellationToken) -> CacheResult<()> {
        if self.memory.remove(key) {
            self.metrics.record_evictions(CacheLevel::L1, 1);
        }
        self.index.forget(key);

        match cancellable(cancel, self.distributed.remove(key)).await {
            None => Err(CacheError::Cancelled),
            Some(Err(e)) => {
                tracing::warn!(key = %key, error = %e, "L2 DEL error");
                tracing::Span::current().record("cache.error", tracing::field::display(&e));
                self.metrics.record_error(CacheLevel::L2, key);
                Err(e)
            }
            Some(Ok(deleted)) => {
                if deleted {
                    self.metrics.record_evictions(CacheLevel::L2, 1);
                }
                tracing::debug!(key = %key, deleted, "cache invalidated (L1+L2)");
                Ok(())
            }
        }
    }

    /// Remove every known key starting with `prefix` from both tiers.
    ///
    /// Known keys are warmup-registered keys, keys resident in L1 and, when
    /// `index_all_keys` is on, every key written through [`set`](Self::set).
    /// Without the full registry, keys that only live in L2 are missed.
    /// Returns the number of keys removed.
    pub async fn remove_by_prefix(&self, prefix: &str) -> CacheResult<usize> {
        self.remove_by_prefix_cancellable(prefix, &CancellationToken::new())
            .await
    }

    pub async fn remove_by_prefix_cancellable(
        &self,
        prefix: &str,
        cancel: &CancellationToken,
    ) -> CacheResult<usize> {
        if prefix.trim().is_empty() {
            return Err(CacheError::InvalidKey(
                "prefix must not be empty".to_string(),
            ));
        }
        let span = tracing::debug_span!(
            "cache.remove_by_prefix",
            cache.key = %prefix,
            cache.level = CacheLevel::Both.as_str(),
            cache.error = Empty
        );

        async {
            let mut keys: BTreeSet<String> = self.index.keys_with_prefix(prefix);
            keys.extend(self.memory.keys_with_prefix(prefix));

            if !self.policy.index_all_keys {
                tracing::warn!(
                    prefix = %prefix,
                    "prefix removal is best-effort: keys held only in L2 are not indexed"
                );
            }

            let mut removed = 0;
            let mut first_error = None;
            for key in &keys {
                match self.remove_both(key, cancel).await {
                    Ok(()) => removed += 1,
                    Err(CacheError::Cancelled) => return Err(CacheError::Cancelled),
                    Err(e) => {
                        first_error.get_or_insert(e);
                    }
                }
            }

            tracing::debug!(prefix = %prefix, removed, "cache prefix invalidated");
            match first_error {
                Some(e) => Err(e),
                None => Ok(removed),
            }
        }
        .instrument(span)
        .await
    }

    // =========================================================================
    // Inspection
    // =========================================================================

    /// L1 metadata for a key (tier, TTL, expiry).
    pub fn inspect(&self, key: &str) -> Option<CacheEntryInfo> {
        self.memory.info(key)
    }

    /// Remaining L2 TTL for a key.
    pub async fn l2_ttl(&self, key: &str) -> CacheResult<Option<Duration>> {
        validate_key(key)?;
        self.distributed.ttl(key).await
    }

    /// Drop every L1 entry; L2 is untouched.
    pub fn clear_l1(&self) {
        let count = self.memory.len();
        self.memory.clear();
        self.metrics
            .record_evictions(CacheLevel::L1, count as u64);
        tracing::info!(entries = count, "Cleared L1 cache");
    }
}

/// Await `fut` unless `cancel` fires first. `None` means cancelled.
async fn cancellable<F: Future>(cancel: &CancellationToken, fut: F) -> Option<F::Output> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => None,
        output = fut => Some(output),
    }
}
