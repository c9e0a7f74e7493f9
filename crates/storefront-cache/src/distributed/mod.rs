//! Distributed (L2) stores.
//!
//! L2 holds serialized payloads with absolute expiry. Two backends:
//!
//! - **Redis**: shared across instances, removals are broadcast over pub/sub
//!   so other instances drop their L1 copies
//! - **In-memory**: single-instance fallback and test double
//!
//! If Redis is disabled or unreachable at startup the cache falls back to the
//! in-memory store, so the process can start and run without Redis.

mod memory;
pub mod redis_store;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::config::RedisConfig;
use crate::error::CacheResult;
use crate::memory::MemoryStore;

pub use self::memory::InMemoryDistributedStore;
pub use self::redis_store::{InvalidationListener, RedisStore};

/// Shared key-value store holding serialized blobs.
#[async_trait]
pub trait DistributedStore: Send + Sync {
    /// Backend name used in logs and errors.
    fn name(&self) -> &'static str;

    /// Fetch an unexpired payload.
    async fn get(&self, key: &str) -> CacheResult<Option<Vec<u8>>>;

    /// Store a payload with an absolute expiry of now + `ttl`.
    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> CacheResult<()>;

    /// Remove a key. Returns `true` if a payload was deleted; absence is not
    /// an error.
    async fn remove(&self, key: &str) -> CacheResult<bool>;

    /// Returns `true` if the key holds an unexpired payload.
    async fn exists(&self, key: &str) -> CacheResult<bool>;

    /// Remaining TTL of a key, `None` if absent.
    async fn ttl(&self, key: &str) -> CacheResult<Option<Duration>>;

    /// Drop expired payloads the backend does not expire on its own.
    /// Returns the number removed. Redis expires keys itself.
    async fn sweep_expired(&self) -> CacheResult<usize> {
        Ok(0)
    }

    /// Check if the backend is reachable (for health checks).
    async fn is_available(&self) -> bool {
        true
    }
}

pub type DynDistributedStore = Arc<dyn DistributedStore>;

/// Create the L2 store based on configuration.
///
/// - **Redis disabled**: in-memory store
/// - **Redis enabled**: connects to Redis and starts the invalidation
///   listener for `local`; falls back to the in-memory store on failure
pub async fn create_distributed_store(
    config: &RedisConfig,
    namespace: &str,
    local: &Arc<MemoryStore>,
    shutdown: &CancellationToken,
) -> DynDistributedStore {
    if !config.enabled {
        tracing::info!("Redis disabled, using in-memory L2 store");
        return Arc::new(InMemoryDistributedStore::new());
    }

    tracing::info!(url = %config.url, "Connecting to Redis");

    let pool = match redis_store::create_pool(config) {
        Ok(pool) => pool,
        Err(e) => {
            tracing::warn!(
                error = %e,
                "Failed to create Redis pool. Falling back to in-memory L2 store."
            );
            return Arc::new(InMemoryDistributedStore::new());
        }
    };

    match pool.get().await {
        Ok(_) => {
            tracing::info!("Connected to Redis");

            let store = RedisStore::new(pool, namespace);
            InvalidationListener {
                redis_url: config.url.clone(),
                channel: store.invalidation_channel().to_string(),
                local_cache: Arc::clone(local),
            }
            .start(shutdown.clone());

            Arc::new(store)
        }
        Err(e) => {
            tracing::warn!(
                error = %e,
                "Failed to connect to Redis. Falling back to in-memory L2 store."
            );
            Arc::new(InMemoryDistributedStore::new())
        }
    }
}
