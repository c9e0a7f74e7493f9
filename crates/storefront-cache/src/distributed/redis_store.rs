//! Redis-backed L2 store and cross-instance L1 invalidation.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use deadpool_redis::Pool;
use redis::AsyncCommands;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::DistributedStore;
use crate::config::RedisConfig;
use crate::error::{CacheError, CacheResult};
use crate::memory::MemoryStore;

const MAX_BACKOFF: Duration = Duration::from_secs(300); // 5 minutes max

/// Build a connection pool from configuration.
pub fn create_pool(config: &RedisConfig) -> CacheResult<Pool> {
    let timeout = Some(config.timeout());
    let mut pool_config = deadpool_redis::PoolConfig::new(config.pool_size);
    pool_config.timeouts.wait = timeout;
    pool_config.timeouts.create = timeout;
    pool_config.timeouts.recycle = timeout;

    let mut redis_config = deadpool_redis::Config::from_url(&config.url);
    redis_config.pool = Some(pool_config);

    redis_config
        .create_pool(Some(deadpool_redis::Runtime::Tokio1))
        .map_err(|e| CacheError::backend("redis", format!("failed to create pool: {e}")))
}

/// L2 store on top of a Redis connection pool.
///
/// Every key is prefixed with the configured namespace. Removals are
/// published on `<namespace>cache:invalidate` so that other instances can
/// drop their L1 copy.
#[derive(Clone)]
pub struct RedisStore {
    pool: Pool,
    namespace: String,
    channel: String,
}

impl RedisStore {
    pub fn new(pool: Pool, namespace: impl Into<String>) -> Self {
        let namespace = namespace.into();
        let channel = format!("{namespace}cache:invalidate");
        Self {
            pool,
            namespace,
            channel,
        }
    }

    /// Pub/sub channel carrying removed keys.
    pub fn invalidation_channel(&self) -> &str {
        &self.channel
    }

    #[inline]
    fn namespaced(&self, key: &str) -> String {
        format!("{}{key}", self.namespace)
    }
}

#[async_trait]
impl DistributedStore for RedisStore {
    fn name(&self) -> &'static str {
        "redis"
    }

    async fn get(&self, key: &str) -> CacheResult<Option<Vec<u8>>> {
        let mut conn = self.pool.get().await?;
        let data = conn
            .get::<_, Option<Vec<u8>>>(self.namespaced(key))
            .await?;
        Ok(data)
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> CacheResult<()> {
        let mut conn = self.pool.get().await?;
        let key = self.namespaced(key);

        // Redis rejects a zero expiry; a zero TTL means "already expired"
        if ttl.is_zero() {
            conn.del::<_, ()>(&key).await?;
            return Ok(());
        }

        let millis = u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX).max(1);
        conn.pset_ex::<_, _, ()>(&key, value, millis).await?;
        tracing::debug!(key = %key, ttl_ms = millis, "redis SET");
        Ok(())
    }

    async fn remove(&self, key: &str) -> CacheResult<bool> {
        let mut conn = self.pool.get().await?;
        let deleted = conn.del::<_, usize>(self.namespaced(key)).await?;

        // Other instances drop their L1 copy; a lost message only delays that
        // until the L1 TTL runs out.
        if let Err(e) = conn.publish::<_, _, ()>(&self.channel, key).await {
            tracing::warn!(key = %key, error = %e, "Redis PUBLISH error");
        }
        Ok(deleted > 0)
    }

    async fn exists(&self, key: &str) -> CacheResult<bool> {
        let mut conn = self.pool.get().await?;
        let exists = conn.exists::<_, bool>(self.namespaced(key)).await?;
        Ok(exists)
    }

    async fn ttl(&self, key: &str) -> CacheResult<Option<Duration>> {
        let mut conn = self.pool.get().await?;
        let millis = conn.pttl::<_, i64>(self.namespaced(key)).await?;
        Ok(match millis {
            -2 => None,
            -1 => Some(Duration::MAX),
            ms => Some(Duration::from_millis(ms.max(0) as u64)),
        })
    }

    async fn is_available(&self) -> bool {
        self.pool.get().await.is_ok()
    }
}

/// Listens for removals published by other instances and drops the matching
/// L1 entries.
///
/// ```text
/// Instance 1: cache.remove("product:42")
///   ↓
/// PUBLISH storefront:cache:invalidate "product:42"
///   ↓
/// Instance 2, 3: listener removes "product:42" from L1
/// ```
pub struct InvalidationListener {
    pub redis_url: String,
    pub channel: String,
    pub local_cache: Arc<MemoryStore>,
}

impl InvalidationListener {
    /// Spawn the listener. It reconnects with exponential backoff until
    /// `shutdown` is cancelled.
    pub fn start(self, shutdown: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut backoff = Duration::from_secs(1);

            loop {
                let result = tokio::select! {
                    _ = shutdown.cancelled() => break,
                    result = self.run() => result,
                };

                match result {
                    Ok(()) => {
                        backoff = Duration::from_secs(1);
                    }
                    Err(e) => {
                        tracing::error!(
                            error = %e,
                            backoff_secs = backoff.as_secs(),
                            "Cache invalidation listener error, reconnecting..."
                        );
                        tokio::select! {
                            _ = shutdown.cancelled() => break,
                            _ = tokio::time::sleep(backoff) => {}
                        }
                        backoff = (backoff * 2).min(MAX_BACKOFF);
                    }
                }
            }

            tracing::debug!(channel = %self.channel, "cache invalidation listener stopped");
        })
    }

    async fn run(&self) -> CacheResult<()> {
        use futures_util::StreamExt;

        let client = redis::Client::open(self.redis_url.as_str())?;
        let mut pubsub = client.get_async_pubsub().await?;
        pubsub.subscribe(&self.channel).await?;

        tracing::info!(channel = %self.channel, "Subscribed to cache invalidation channel");

        let mut stream = pubsub.on_message();
        while let Some(msg) = stream.next().await {
            match msg.get_payload::<String>() {
                Ok(key) => {
                    tracing::debug!(key = %key, "received cache invalidation");
                    self.local_cache.remove(&key);
                }
                Err(e) => {
                    tracing::warn!(error = %e, "failed to parse invalidation message payload");
                }
            }
        }

        Err(CacheError::backend("redis", "pub/sub connection closed"))
    }
}
