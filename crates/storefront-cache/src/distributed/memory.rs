//! In-process implementation of the L2 contract.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;

use super::DistributedStore;
use crate::entry::{expires_after, is_expired_at};
use crate::error::CacheResult;

#[derive(Clone, Debug)]
struct StoredBlob {
    data: Arc<Vec<u8>>,
    expires_at: Instant,
}

/// L2 store backed by a `DashMap`.
///
/// Used when Redis is disabled, and as the L2 of choice in tests since every
/// instance is isolated.
#[derive(Default)]
pub struct InMemoryDistributedStore {
    blobs: DashMap<String, StoredBlob>,
}

impl InMemoryDistributedStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remove every expired blob. Returns the number removed.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.blobs.len();
        self.blobs.retain(|_, blob| !is_expired_at(blob.expires_at, now));
        before.saturating_sub(self.blobs.len())
    }

    pub fn len(&self) -> usize {
        self.blobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blobs.is_empty()
    }
}

#[async_trait]
impl DistributedStore for InMemoryDistributedStore {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn sweep_expired(&self) -> CacheResult<usize> {
        Ok(self.purge_expired())
    }

    async fn get(&self, key: &str) -> CacheResult<Option<Vec<u8>>> {
        let now = Instant::now();
        if let Some(blob) = self.blobs.get(key) {
            if !is_expired_at(blob.expires_at, now) {
                return Ok(Some(blob.data.as_ref().clone()));
            }
            drop(blob);
            self.blobs
                .remove_if(key, |_, blob| is_expired_at(blob.expires_at, now));
        }
        Ok(None)
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> CacheResult<()> {
        let blob = StoredBlob {
            data: Arc::new(value),
            expires_at: expires_after(Instant::now(), ttl),
        };
        self.blobs.insert(key.to_string(), blob);
        Ok(())
    }

    async fn remove(&self, key: &str) -> CacheResult<bool> {
        Ok(self.blobs.remove(key).is_some())
    }

    async fn exists(&self, key: &str) -> CacheResult<bool> {
        let now = Instant::now();
        Ok(self
            .blobs
            .get(key)
            .is_some_and(|blob| !is_expired_at(blob.expires_at, now)))
    }

    async fn ttl(&self, key: &str) -> CacheResult<Option<Duration>> {
        let now = Instant::now();
        Ok(self
            .blobs
            .get(key)
            .filter(|blob| !is_expired_at(blob.expires_at, now))
            .map(|blob| blob.expires_at.saturating_duration_since(now)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_get_set_remove() {
        let store = InMemoryDistributedStore::new();
        store
            .set("k", b"value".to_vec(), Duration::from_secs(60))
            .await
            .unwrap();

        assert_eq!(store.get("k").await.unwrap(), Some(b"value".to_vec()));
        assert!(store.exists("k").await.unwrap());

        assert!(store.remove("k").await.unwrap());
        assert_eq!(store.get("k").await.unwrap(), None);
        // Removing again is not an error
        assert!(!store.remove("k").await.unwrap());
    }

    #[tokio::test]
    async fn test_expiration() {
        let store = InMemoryDistributedStore::new();
        store
            .set("k", b"v".to_vec(), Duration::from_millis(50))
            .await
            .unwrap();
        assert!(store.get("k").await.unwrap().is_some());

        tokio::time::sleep(Duration::from_millis(80)).await;

        assert!(store.get("k").await.unwrap().is_none());
        assert!(!store.exists("k").await.unwrap());
        assert!(store.ttl("k").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_ttl_and_purge() {
        let store = InMemoryDistributedStore::new();
        store
            .set("live", b"v".to_vec(), Duration::from_secs(1800))
            .await
            .unwrap();
        store.set("dead", b"v".to_vec(), Duration::ZERO).await.unwrap();

        let ttl = store.ttl("live").await.unwrap().unwrap();
        assert!(ttl > Duration::from_secs(1790) && ttl <= Duration::from_secs(1800));

        assert_eq!(store.purge_expired(), 1);
        assert_eq!(store.len(), 1);
    }
}
