//! Cache warmup: populate well-known keys at startup and refresh them by kind.
//!
//! ## State machine
//!
//! ```text
//! Idle → Warming → Warmed ⇄ Refreshing(kind)
//! ```
//!
//! Sources run concurrently and are all awaited; one failing source never
//! cancels the others. Startup warmup runs as a supervised background task
//! whose failures are logged and never reach the caller.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use futures_util::future::join_all;
use serde::Serialize;
use thiserror::Error;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::error::CacheResult;
use crate::tiered::TieredCache;

/// Category of warmed keys, refreshed independently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum WarmupKind {
    /// Slow-changing reference data (categories, first catalog page)
    Reference,
    /// Hot entities
    Frequent,
    /// Configuration values
    Config,
}

impl WarmupKind {
    pub const ALL: [WarmupKind; 3] = [
        WarmupKind::Reference,
        WarmupKind::Frequent,
        WarmupKind::Config,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            WarmupKind::Reference => "reference",
            WarmupKind::Frequent => "frequent",
            WarmupKind::Config => "config",
        }
    }
}

impl fmt::Display for WarmupKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown warmup kind '{0}'")]
pub struct UnknownWarmupKind(pub String);

impl FromStr for WarmupKind {
    type Err = UnknownWarmupKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "reference" => Ok(WarmupKind::Reference),
            "frequent" => Ok(WarmupKind::Frequent),
            "config" => Ok(WarmupKind::Config),
            _ => Err(UnknownWarmupKind(s.to_string())),
        }
    }
}

/// Coordinator lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WarmupState {
    Idle,
    Warming,
    Warmed,
    Refreshing(WarmupKind),
}

/// Handle given to a source while it loads: writes through the tiered cache
/// and registers every key under the source's kind.
pub struct WarmupScope<'a> {
    cache: &'a TieredCache,
    kind: WarmupKind,
    written: AtomicUsize,
}

impl<'a> WarmupScope<'a> {
    fn new(cache: &'a TieredCache, kind: WarmupKind) -> Self {
        Self {
            cache,
            kind,
            written: AtomicUsize::new(0),
        }
    }

    pub fn kind(&self) -> WarmupKind {
        self.kind
    }

    /// Write with the cache's default TTLs.
    pub async fn put<T>(&self, key: &str, value: T) -> CacheResult<()>
    where
        T: Serialize + Send + Sync + 'static,
    {
        self.put_with_ttl(key, value, None, None).await
    }

    pub async fn put_with_ttl<T>(
        &self,
        key: &str,
        value: T,
        l1_ttl: Option<Duration>,
        l2_ttl: Option<Duration>,
    ) -> CacheResult<()>
    where
        T: Serialize + Send + Sync + 'static,
    {
        self.cache.set(key, value, l1_ttl, l2_ttl).await?;
        self.cache.key_index().register(self.kind, key);
        self.written.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn written(&self) -> usize {
        self.written.load(Ordering::Relaxed)
    }
}

/// A loader of well-known keys for one [`WarmupKind`].
#[async_trait]
pub trait WarmupSource: Send + Sync {
    fn kind(&self) -> WarmupKind;

    /// Name used in logs and reports.
    fn name(&self) -> &str;

    /// Load values and write them through `scope`.
    async fn load(&self, scope: &WarmupScope<'_>) -> CacheResult<()>;
}

/// Result of running one source.
#[derive(Debug, Clone)]
pub struct SourceOutcome {
    pub source: String,
    pub kind: WarmupKind,
    pub keys_written: usize,
    pub elapsed: Duration,
    pub error: Option<String>,
}

/// Result of a warmup or refresh run.
#[derive(Debug, Clone, Default)]
pub struct WarmupReport {
    pub outcomes: Vec<SourceOutcome>,
}

impl WarmupReport {
    pub fn is_success(&self) -> bool {
        self.outcomes.iter().all(|o| o.error.is_none())
    }

    pub fn keys_written(&self) -> usize {
        self.outcomes.iter().map(|o| o.keys_written).sum()
    }

    pub fn failures(&self) -> impl Iterator<Item = &SourceOutcome> {
        self.outcomes.iter().filter(|o| o.error.is_some())
    }
}

pub struct WarmupCoordinator {
    cache: Arc<TieredCache>,
    sources: Vec<Arc<dyn WarmupSource>>,
    state: watch::Sender<WarmupState>,
}

impl WarmupCoordinator {
    pub fn new(cache: Arc<TieredCache>) -> Self {
        let (state, _) = watch::channel(WarmupState::Idle);
        Self {
            cache,
            sources: Vec::new(),
            state,
        }
    }

    pub fn with_source(mut self, source: Arc<dyn WarmupSource>) -> Self {
        self.sources.push(source);
        self
    }

    pub fn state(&self) -> WarmupState {
        *self.state.borrow()
    }

    /// Watch state transitions (e.g. to wait for `Warmed`).
    pub fn subscribe(&self) -> watch::Receiver<WarmupState> {
        self.state.subscribe()
    }

    /// Run every source concurrently and wait for all of them.
    pub async fn warm_all(&self) -> WarmupReport {
        self.state.send_replace(WarmupState::Warming);
        tracing::info!(sources = self.sources.len(), "Cache warmup started");

        let report = self.run_sources(None).await;

        self.state.send_replace(WarmupState::Warmed);
        log_report("Cache warmup", &report);
        report
    }

    /// Run [`warm_all`](Self::warm_all) in a supervised background task.
    ///
    /// The returned handle completes once warmup has finished, failed or been
    /// stopped by `shutdown`; it never yields an error. On shutdown the
    /// in-flight sources are aborted and the state is left as it was.
    pub fn spawn_startup(self: &Arc<Self>, shutdown: CancellationToken) -> JoinHandle<()> {
        let this = Arc::clone(self);
        tokio::spawn(async move {
            let worker = Arc::clone(&this);
            let mut run = tokio::spawn(async move { worker.warm_all().await });

            let result = tokio::select! {
                result = &mut run => result,
                _ = shutdown.cancelled() => {
                    run.abort();
                    tracing::info!("Cache warmup stopped by shutdown");
                    return;
                }
            };

            if let Err(e) = result {
                // Panicked or aborted mid-run; the process keeps going cold
                tracing::error!(error = %e, "Cache warmup task failed");
                this.state.send_replace(WarmupState::Warmed);
            }
        })
    }

    /// Remove then repopulate every key of the named kind.
    ///
    /// Unknown kinds are logged and ignored (`None`).
    pub async fn refresh_category(&self, kind: &str) -> Option<WarmupReport> {
        let kind = match kind.parse::<WarmupKind>() {
            Ok(kind) => kind,
            Err(e) => {
                tracing::warn!(kind = %kind, error = %e, "Ignoring cache refresh request");
                return None;
            }
        };
        Some(self.refresh(kind).await)
    }

    pub async fn refresh(&self, kind: WarmupKind) -> WarmupReport {
        self.state.send_replace(WarmupState::Refreshing(kind));

        if let Err(e) = self.remove_category(kind).await {
            tracing::warn!(kind = %kind, error = %e, "Cache refresh removal incomplete");
        }
        let report = self.populate_category(kind).await;

        self.state.send_replace(WarmupState::Warmed);
        report
    }

    /// Removal phase: drop every key registered under `kind` from both tiers.
    /// Returns the number of keys removed.
    pub async fn remove_category(&self, kind: WarmupKind) -> CacheResult<usize> {
        let keys = self.cache.key_index().take_kind(kind);
        let mut removed = 0;
        let mut first_error = None;

        for key in &keys {
            match self.cache.remove(key).await {
                Ok(()) => removed += 1,
                Err(e) => {
                    tracing::warn!(key = %key, error = %e, "Failed to remove warmed key");
                    // Still in L2; keep it refreshable
                    self.cache.key_index().register(kind, key);
                    first_error.get_or_insert(e);
                }
            }
        }

        tracing::debug!(kind = %kind, removed, "Removed warmed keys");
        match first_error {
            Some(e) => Err(e),
            None => Ok(removed),
        }
    }

    /// Repopulation phase: rerun the sources of `kind`.
    pub async fn populate_category(&self, kind: WarmupKind) -> WarmupReport {
        let report = self.run_sources(Some(kind)).await;
        log_report("Cache refresh", &report);
        report
    }

    async fn run_sources(&self, kind: Option<WarmupKind>) -> WarmupReport {
        let runs = self
            .sources
            .iter()
            .filter(|source| kind.is_none_or(|k| source.kind() == k))
            .map(|source| self.run_source(source.as_ref()));

        WarmupReport {
            outcomes: join_all(runs).await,
        }
    }

    async fn run_source(&self, source: &dyn WarmupSource) -> SourceOutcome {
        let started = Instant::now();
        let scope = WarmupScope::new(&self.cache, source.kind());
        let result = source.load(&scope).await;

        let outcome = SourceOutcome {
            source: source.name().to_string(),
            kind: source.kind(),
            keys_written: scope.written(),
            elapsed: started.elapsed(),
            error: result.err().map(|e| e.to_string()),
        };

        match &outcome.error {
            None => tracing::debug!(
                source = %outcome.source,
                kind = %outcome.kind,
                keys = outcome.keys_written,
                "Warmup source completed"
            ),
            Some(error) => tracing::error!(
                source = %outcome.source,
                kind = %outcome.kind,
                keys = outcome.keys_written,
                error = %error,
                "Warmup source failed"
            ),
        }
        outcome
    }
}

fn log_report(what: &str, report: &WarmupReport) {
    let failed = report.failures().count();
    if failed == 0 {
        tracing::info!(
            keys = report.keys_written(),
            sources = report.outcomes.len(),
            "{what} completed"
        );
    } else {
        tracing::warn!(
            keys = report.keys_written(),
            sources = report.outcomes.len(),
            failed,
            "{what} completed with failures"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_kind() {
        assert_eq!("reference".parse::<WarmupKind>(), Ok(WarmupKind::Reference));
        assert_eq!(" Frequent ".parse::<WarmupKind>(), Ok(WarmupKind::Frequent));
        assert_eq!("CONFIG".parse::<WarmupKind>(), Ok(WarmupKind::Config));
        let err = "inventory".parse::<WarmupKind>().unwrap_err();
        assert_eq!(err.to_string(), "unknown warmup kind 'inventory'");
        let _: &dyn std::error::Error = &err;
    }

    #[test]
    fn test_kind_names_round_trip() {
        for kind in WarmupKind::ALL {
            assert_eq!(kind.as_str().parse::<WarmupKind>(), Ok(kind));
        }
    }

    #[test]
    fn test_empty_report_is_success() {
        let report = WarmupReport::default();
        assert!(report.is_success());
        assert_eq!(report.keys_written(), 0);
    }
}
