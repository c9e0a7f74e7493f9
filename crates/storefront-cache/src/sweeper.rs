//! Background removal of expired entries.
//!
//! Reads already skip and drop expired entries; the sweeper bounds how long
//! an entry nobody reads again keeps its memory. L1 is always swept; L2 only
//! when the backend does not expire keys itself (the in-memory store).

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::distributed::DynDistributedStore;
use crate::memory::MemoryStore;
use crate::metrics::{CacheLevel, CacheMetrics};

/// Spawn the sweep loop. It stops when `shutdown` is cancelled.
pub fn spawn_sweeper(
    memory: Arc<MemoryStore>,
    distributed: DynDistributedStore,
    metrics: Arc<CacheMetrics>,
    interval: Duration,
    shutdown: CancellationToken,
) -> JoinHandle<()> {
    let interval = interval.max(Duration::from_millis(1));

    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {
                    let removed = memory.purge_expired();
                    if removed > 0 {
                        metrics.record_evictions(CacheLevel::L1, removed as u64);
                        tracing::debug!(removed, "swept expired L1 entries");
                    }
                    metrics.set_entries(CacheLevel::L1, memory.len());

                    match distributed.sweep_expired().await {
                        Ok(0) => {}
                        Ok(removed) => {
                            metrics.record_evictions(CacheLevel::L2, removed as u64);
                            tracing::debug!(removed, "swept expired L2 entries");
                        }
                        Err(e) => {
                            tracing::warn!(error = %e, backend = distributed.name(), "L2 sweep failed");
                        }
                    }
                }
            }
        }

        tracing::debug!("cache sweeper stopped");
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::distributed::{DistributedStore, InMemoryDistributedStore};

    #[tokio::test]
    async fn test_sweeper_removes_expired_entries() {
        let memory = Arc::new(MemoryStore::new(10));
        let metrics = Arc::new(CacheMetrics::new());
        memory.insert("dead", 1_u32, Duration::ZERO);
        memory.insert("live", 2_u32, Duration::from_secs(60));

        let shutdown = CancellationToken::new();
        let handle = spawn_sweeper(
            Arc::clone(&memory),
            Arc::new(InMemoryDistributedStore::new()),
            Arc::clone(&metrics),
            Duration::from_millis(10),
            shutdown.clone(),
        );

        tokio::time::sleep(Duration::from_millis(50)).await;
        shutdown.cancel();
        handle.await.unwrap();

        assert_eq!(memory.len(), 1);
        assert!(memory.contains("live"));
        assert_eq!(metrics.snapshot().l1_evictions, 1);
    }

    #[tokio::test]
    async fn test_sweeper_drops_expired_l2_blobs() {
        let memory = Arc::new(MemoryStore::new(10));
        let l2 = Arc::new(InMemoryDistributedStore::new());
        let metrics = Arc::new(CacheMetrics::new());
        for i in 0..100 {
            l2.set(&format!("gone:{i}"), b"v".to_vec(), Duration::from_millis(1))
                .await
                .unwrap();
        }
        l2.set("kept", b"v".to_vec(), Duration::from_secs(60))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(5)).await;

        let shutdown = CancellationToken::new();
        let handle = spawn_sweeper(
            Arc::clone(&memory),
            l2.clone(),
            Arc::clone(&metrics),
            Duration::from_millis(10),
            shutdown.clone(),
        );

        tokio::time::sleep(Duration::from_millis(50)).await;
        shutdown.cancel();
        handle.await.unwrap();

        assert_eq!(l2.len(), 1);
        assert!(l2.exists("kept").await.unwrap());
        assert_eq!(metrics.snapshot().l2_evictions, 100);
    }
}
