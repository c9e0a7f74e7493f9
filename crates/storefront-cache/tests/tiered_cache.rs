//! Integration tests for the two-tier cache.
//!
//! L2 is the in-memory store unless a test needs a misbehaving backend, in
//! which case a small `DistributedStore` double is defined below.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use storefront_cache::{
    CacheError, CacheLevel, CachePolicy, CacheTier, CacheResult, CancellationToken, DistributedStore,
    InMemoryDistributedStore, MemoryStore, SerializationFormat, TieredCache,
};
use tokio::task::JoinSet;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Product {
    id: u64,
    name: String,
    unit_price: u64,
}

fn widget() -> Product {
    Product {
        id: 42,
        name: "Widget".to_string(),
        unit_price: 1299,
    }
}

fn cache_with(policy: CachePolicy) -> TieredCache {
    TieredCache::new(
        Arc::new(MemoryStore::new(1_000)),
        Arc::new(InMemoryDistributedStore::new()),
        policy,
    )
}

fn cache() -> TieredCache {
    cache_with(CachePolicy::default())
}

/// L2 that fails every call.
struct FailingStore;

#[async_trait]
impl DistributedStore for FailingStore {
    fn name(&self) -> &'static str {
        "failing"
    }

    async fn get(&self, _key: &str) -> CacheResult<Option<Vec<u8>>> {
        Err(CacheError::backend("failing", "connection refused"))
    }

    async fn set(&self, _key: &str, _value: Vec<u8>, _ttl: Duration) -> CacheResult<()> {
        Err(CacheError::backend("failing", "connection refused"))
    }

    async fn remove(&self, _key: &str) -> CacheResult<bool> {
        Err(CacheError::backend("failing", "connection refused"))
    }

    async fn exists(&self, _key: &str) -> CacheResult<bool> {
        Err(CacheError::backend("failing", "connection refused"))
    }

    async fn ttl(&self, _key: &str) -> CacheResult<Option<Duration>> {
        Err(CacheError::backend("failing", "connection refused"))
    }

    async fn is_available(&self) -> bool {
        false
    }
}

/// L2 whose writes take a while; counts completed writes.
struct SlowStore {
    inner: InMemoryDistributedStore,
    delay: Duration,
    completed_sets: AtomicUsize,
}

#[async_trait]
impl DistributedStore for SlowStore {
    fn name(&self) -> &'static str {
        "slow"
    }

    async fn get(&self, key: &str) -> CacheResult<Option<Vec<u8>>> {
        self.inner.get(key).await
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> CacheResult<()> {
        tokio::time::sleep(self.delay).await;
        self.inner.set(key, value, ttl).await?;
        self.completed_sets.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn remove(&self, key: &str) -> CacheResult<bool> {
        self.inner.remove(key).await
    }

    async fn exists(&self, key: &str) -> CacheResult<bool> {
        self.inner.exists(key).await
    }

    async fn ttl(&self, key: &str) -> CacheResult<Option<Duration>> {
        self.inner.ttl(key).await
    }
}

#[tokio::test]
async fn test_set_then_get_is_served_from_l1() {
    let cache = cache();
    cache.set("product:42", widget(), None, None).await.unwrap();

    for _ in 0..3 {
        let hit = cache.lookup::<Product>("product:42").await.unwrap().unwrap();
        assert_eq!(hit.value, widget());
        assert_eq!(hit.level, CacheLevel::L1);
    }

    let stats = cache.stats();
    assert_eq!(stats.l1_hits, 3);
    assert_eq!(stats.l2_hits, 0);
    assert_eq!(stats.l1_sets, 1);
    assert_eq!(stats.l2_sets, 1);
}

#[tokio::test]
async fn test_missing_key_is_none() {
    let cache = cache();
    assert_eq!(cache.get::<Product>("product:404").await.unwrap(), None);
    assert_eq!(cache.stats().misses, 1);
    assert_eq!(cache.stats().hit_rate(), 0.0);
}

#[tokio::test]
async fn test_l2_hit_promotes_with_promotion_ttl() {
    let policy = CachePolicy {
        promotion_ttl: Duration::from_secs(120),
        ..CachePolicy::default()
    };
    let cache = cache_with(policy);

    // Seed L2 only
    let payload = serde_json::to_vec(&widget()).unwrap();
    cache
        .distributed()
        .set("product:42", payload, Duration::from_secs(1800))
        .await
        .unwrap();
    assert!(cache.inspect("product:42").is_none());

    let first = cache.lookup::<Product>("product:42").await.unwrap().unwrap();
    assert_eq!(first.level, CacheLevel::L2);
    assert_eq!(first.value, widget());

    let info = cache.inspect("product:42").unwrap();
    assert_eq!(info.ttl(), Duration::from_secs(120));
    let l2_ttl = cache.l2_ttl("product:42").await.unwrap().unwrap();
    assert!(l2_ttl > info.ttl());

    let second = cache.lookup::<Product>("product:42").await.unwrap().unwrap();
    assert_eq!(second.level, CacheLevel::L1);
}

#[tokio::test]
async fn test_expired_l1_copy_falls_back_to_l2() {
    let cache = cache();
    cache
        .set(
            "product:42",
            widget(),
            Some(Duration::from_millis(30)),
            Some(Duration::from_secs(60)),
        )
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(60)).await;

    let hit = cache.lookup::<Product>("product:42").await.unwrap().unwrap();
    assert_eq!(hit.level, CacheLevel::L2);
    assert_eq!(cache.stats().l1_evictions, 1);
}

#[tokio::test]
async fn test_zero_l1_ttl_falls_through_to_l2() {
    let cache = cache();
    cache
        .set("product:42", widget(), Some(Duration::ZERO), None)
        .await
        .unwrap();

    let hit = cache.lookup::<Product>("product:42").await.unwrap().unwrap();
    assert_eq!(hit.level, CacheLevel::L2);
}

#[tokio::test]
async fn test_remove_clears_both_tiers() {
    let cache = cache();
    cache.set("product:42", widget(), None, None).await.unwrap();

    cache.remove("product:42").await.unwrap();

    assert!(cache.inspect("product:42").is_none());
    assert!(!cache.distributed().exists("product:42").await.unwrap());
    assert_eq!(cache.get::<Product>("product:42").await.unwrap(), None);

    let stats = cache.stats();
    assert_eq!(stats.l1_hits, 0);
    assert_eq!(stats.l2_hits, 0);
    assert_eq!(stats.misses, 1);
    assert_eq!(stats.l2_evictions, 1);

    // Removing an absent key is not an error and evicts nothing
    cache.remove("product:42").await.unwrap();
    assert_eq!(cache.stats().l2_evictions, 1);
}

#[tokio::test]
async fn test_clear_l1_then_read_comes_from_l2() {
    let cache = cache();
    cache
        .set(
            "product:42",
            widget(),
            Some(Duration::from_secs(5 * 60)),
            Some(Duration::from_secs(30 * 60)),
        )
        .await
        .unwrap();

    let hit = cache.lookup::<Product>("product:42").await.unwrap().unwrap();
    assert_eq!(hit.level, CacheLevel::L1);

    cache.clear_l1();
    let hit = cache.lookup::<Product>("product:42").await.unwrap().unwrap();
    assert_eq!(hit.level, CacheLevel::L2);
    assert_eq!(hit.value.name, "Widget");
    assert_eq!(hit.value.unit_price, 1299);
    assert_eq!(
        cache.inspect("product:42").map(|info| info.tier),
        Some(CacheTier::L1)
    );
}

#[tokio::test]
async fn test_msgpack_format_round_trips_through_l2() {
    let policy = CachePolicy {
        format: SerializationFormat::MessagePack,
        ..CachePolicy::default()
    };
    let cache = cache_with(policy);
    cache.set("product:42", widget(), None, None).await.unwrap();
    cache.clear_l1();

    assert_eq!(
        cache.get::<Product>("product:42").await.unwrap(),
        Some(widget())
    );
}

#[tokio::test]
async fn test_concurrent_writers_leave_one_consistent_value() {
    let cache = Arc::new(cache());
    let mut writers = JoinSet::new();

    for i in 0..16_u64 {
        let cache = Arc::clone(&cache);
        writers.spawn(async move {
            cache
                .set(
                    "product:42",
                    Product {
                        id: 42,
                        name: format!("Widget v{i}"),
                        unit_price: i,
                    },
                    None,
                    None,
                )
                .await
        });
    }
    while let Some(result) = writers.join_next().await {
        result.unwrap().unwrap();
    }

    let from_l1 = cache.get::<Product>("product:42").await.unwrap().unwrap();
    assert!(from_l1.unit_price < 16);
    assert_eq!(from_l1.name, format!("Widget v{}", from_l1.unit_price));

    cache.clear_l1();
    let from_l2 = cache.get::<Product>("product:42").await.unwrap().unwrap();
    assert!(from_l2.unit_price < 16);
    assert_eq!(cache.stats().l2_sets, 16);
}

#[tokio::test]
async fn test_failing_l2_reads_are_misses() {
    let cache = TieredCache::new(
        Arc::new(MemoryStore::new(100)),
        Arc::new(FailingStore),
        CachePolicy::default(),
    );

    assert_eq!(cache.get::<Product>("product:42").await.unwrap(), None);
    assert!(!cache.exists("product:42").await.unwrap());

    let stats = cache.stats();
    assert_eq!(stats.misses, 1);
    assert_eq!(stats.errors, 2);
}

#[tokio::test]
async fn test_failing_l2_set_leaves_l1_unwritten() {
    let cache = TieredCache::new(
        Arc::new(MemoryStore::new(100)),
        Arc::new(FailingStore),
        CachePolicy::default(),
    );

    let result = cache.set("product:42", widget(), None, None).await;
    assert!(matches!(result, Err(CacheError::Backend { backend: "failing", .. })));
    assert!(cache.inspect("product:42").is_none());
    assert!(cache.memory().is_empty());
}

#[tokio::test]
async fn test_failing_l2_remove_still_clears_l1() {
    let memory = Arc::new(MemoryStore::new(100));
    memory.insert("product:42", widget(), Duration::from_secs(60));
    let cache = TieredCache::new(memory, Arc::new(FailingStore), CachePolicy::default());

    assert!(cache.remove("product:42").await.is_err());
    assert!(cache.inspect("product:42").is_none());
}

#[tokio::test]
async fn test_cancelled_set_writes_neither_tier() {
    let store = Arc::new(SlowStore {
        inner: InMemoryDistributedStore::new(),
        delay: Duration::from_millis(500),
        completed_sets: AtomicUsize::new(0),
    });
    let cache = TieredCache::new(
        Arc::new(MemoryStore::new(100)),
        store.clone(),
        CachePolicy::default(),
    );

    let token = CancellationToken::new();
    let canceller = token.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        canceller.cancel();
    });

    let result = cache
        .set_cancellable("product:42", widget(), None, None, &token)
        .await;

    assert!(matches!(result, Err(CacheError::Cancelled)));
    assert!(cache.inspect("product:42").is_none());
    assert_eq!(store.completed_sets.load(Ordering::SeqCst), 0);
    assert!(!store.inner.exists("product:42").await.unwrap());
}

#[tokio::test]
async fn test_cancelled_get_is_miss() {
    let cache = cache();
    cache.set("product:42", widget(), Some(Duration::ZERO), None).await.unwrap();

    let token = CancellationToken::new();
    token.cancel();
    assert_eq!(
        cache
            .get_cancellable::<Product>("product:42", &token)
            .await
            .unwrap(),
        None
    );
}

#[tokio::test]
async fn test_exists_does_not_promote() {
    let cache = cache();
    cache
        .set("product:42", widget(), Some(Duration::ZERO), None)
        .await
        .unwrap();

    assert!(cache.exists("product:42").await.unwrap());
    assert!(cache.inspect("product:42").is_none());
    assert!(!cache.exists("product:43").await.unwrap());
}

#[tokio::test]
async fn test_prefix_removal_with_full_index_reaches_l2_only_keys() {
    let policy = CachePolicy {
        index_all_keys: true,
        ..CachePolicy::default()
    };
    let cache = cache_with(policy);
    for page in 1..=3 {
        let key = format!("products:page:{page}:size:20");
        cache.set(&key, vec![page], None, None).await.unwrap();
    }
    cache.set("product:1", widget(), None, None).await.unwrap();

    cache.clear_l1();
    let removed = cache.remove_by_prefix("products:page:").await.unwrap();

    assert_eq!(removed, 3);
    for page in 1..=3 {
        let key = format!("products:page:{page}:size:20");
        assert!(!cache.exists(&key).await.unwrap());
    }
    assert!(cache.exists("product:1").await.unwrap());
}

#[tokio::test]
async fn test_prefix_removal_without_full_index_misses_l2_only_keys() {
    let cache = cache();
    cache
        .set("products:page:1:size:20", vec![1_u64], None, None)
        .await
        .unwrap();
    cache.clear_l1();

    assert_eq!(cache.remove_by_prefix("products:").await.unwrap(), 0);
    assert!(cache.exists("products:page:1:size:20").await.unwrap());
}
