//! Cache-aside helpers shared by the catalog services.
//!
//! Reads check the cache, fall back to the loader on a miss and write the
//! result back. Writes invalidate after the repository call. A cache failure
//! on either path is logged and never fails the request.

use std::future::Future;
use std::time::Duration;

use serde::{Serialize, de::DeserializeOwned};
use storefront_cache::TieredCache;

use crate::error::CatalogResult;

/// Per-key TTLs. `None` uses the cache policy defaults.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EntryTtl {
    pub l1: Option<Duration>,
    pub l2: Option<Duration>,
}

impl EntryTtl {
    /// Cache policy defaults.
    pub const DEFAULT: EntryTtl = EntryTtl { l1: None, l2: None };

    /// Listings change with every write to any member.
    pub const LISTING: EntryTtl = EntryTtl {
        l1: Some(Duration::from_secs(60)),
        l2: Some(Duration::from_secs(5 * 60)),
    };

    /// Aggregates spanning several entities.
    pub const AGGREGATE: EntryTtl = EntryTtl {
        l1: Some(Duration::from_secs(30)),
        l2: Some(Duration::from_secs(2 * 60)),
    };
}

/// Return the cached value for `key`, or load it and populate the cache.
///
/// `None` from the loader is returned as-is and not cached.
pub async fn read_through<T, F, Fut>(
    cache: &TieredCache,
    key: &str,
    ttl: EntryTtl,
    load: F,
) -> CatalogResult<Option<T>>
where
    T: Serialize + DeserializeOwned + Clone + Send + Sync + 'static,
    F: FnOnce() -> Fut,
    Fut: Future<Output = CatalogResult<Option<T>>>,
{
    if let Some(value) = cache.get::<T>(key).await? {
        return Ok(Some(value));
    }

    let Some(value) = load().await? else {
        return Ok(None);
    };

    if let Err(e) = cache.set(key, value.clone(), ttl.l1, ttl.l2).await {
        tracing::warn!(key = %key, error = %e, "Failed to populate cache, serving uncached value");
    }
    Ok(Some(value))
}

/// Remove `keys` and every key under `prefixes`. Failures are logged.
pub async fn invalidate(cache: &TieredCache, keys: &[String], prefixes: &[&str]) {
    for key in keys {
        if let Err(e) = cache.remove(key).await {
            tracing::warn!(key = %key, error = %e, "Failed to invalidate cache key");
        }
    }
    for prefix in prefixes {
        match cache.remove_by_prefix(prefix).await {
            Ok(removed) => tracing::debug!(prefix = %prefix, removed, "invalidated cache prefix"),
            Err(e) => {
                tracing::warn!(prefix = %prefix, error = %e, "Failed to invalidate cache prefix")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use storefront_cache::{CachePolicy, InMemoryDistributedStore, MemoryStore};

    use crate::error::CatalogError;

    fn cache() -> TieredCache {
        TieredCache::new(
            Arc::new(MemoryStore::new(100)),
            Arc::new(InMemoryDistributedStore::new()),
            CachePolicy::default(),
        )
    }

    #[tokio::test]
    async fn test_loader_runs_once() {
        let cache = cache();
        let calls = AtomicUsize::new(0);

        for _ in 0..3 {
            let value = read_through(&cache, "k", EntryTtl::DEFAULT, || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(Some("v".to_string()))
            })
            .await
            .unwrap();
            assert_eq!(value.as_deref(), Some("v"));
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_absent_is_not_cached() {
        let cache = cache();
        let value: Option<String> = read_through(&cache, "k", EntryTtl::DEFAULT, || async {
            Ok(None)
        })
        .await
        .unwrap();
        assert!(value.is_none());
        assert!(!cache.exists("k").await.unwrap());
    }

    #[tokio::test]
    async fn test_loader_error_propagates() {
        let cache = cache();
        let result: CatalogResult<Option<String>> =
            read_through(&cache, "k", EntryTtl::DEFAULT, || async {
                Err(CatalogError::repository("down"))
            })
            .await;
        assert!(matches!(result, Err(CatalogError::Repository { .. })));
    }

    #[tokio::test]
    async fn test_listing_ttl_applies() {
        let cache = cache();
        read_through(&cache, "products:page:1:size:20", EntryTtl::LISTING, || async {
            Ok(Some(vec![1_u64, 2, 3]))
        })
        .await
        .unwrap();

        let info = cache.inspect("products:page:1:size:20").unwrap();
        assert_eq!(info.ttl(), Duration::from_secs(60));
    }
}
