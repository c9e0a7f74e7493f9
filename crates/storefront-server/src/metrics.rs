//! Prometheus exporter for the cache metrics.
//!
//! The cache crate records through the `metrics` facade; this module installs
//! the recorder those calls land in and periodically logs a stats summary.

use metrics::{Unit, describe_counter, describe_gauge, describe_histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use storefront_cache::TieredCache;
use storefront_cache::metrics::names;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Global Prometheus handle for rendering metrics.
static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Initialize the Prometheus metrics exporter.
///
/// Returns `true` if initialization succeeded, `false` if already initialized
/// or another recorder is installed.
pub fn init_metrics() -> bool {
    if PROMETHEUS_HANDLE.get().is_some() {
        tracing::debug!("Prometheus metrics already initialized");
        return false;
    }

    match PrometheusBuilder::new().install_recorder() {
        Ok(handle) => {
            if PROMETHEUS_HANDLE.set(handle).is_err() {
                tracing::warn!("Failed to store Prometheus handle (already set)");
                return false;
            }

            describe_cache_metrics();
            tracing::info!("Prometheus metrics initialized");
            true
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to install Prometheus recorder");
            false
        }
    }
}

fn describe_cache_metrics() {
    describe_counter!(names::CACHE_HITS_TOTAL, "Cache hits by tier");
    describe_counter!(names::CACHE_MISSES_TOTAL, "Lookups that missed both tiers");
    describe_counter!(names::CACHE_SETS_TOTAL, "Cache writes by tier");
    describe_counter!(names::CACHE_EVICTIONS_TOTAL, "Entries removed or expired by tier");
    describe_counter!(names::CACHE_ERRORS_TOTAL, "Cache backend errors by tier");
    describe_histogram!(names::CACHE_HIT_RATIO, "Hit ratio (0..1) sampled on each lookup");
    describe_gauge!(names::CACHE_ENTRIES, Unit::Count, "Resident entries by tier");
}

/// Render all metrics in Prometheus text format.
///
/// Returns `None` if metrics were not initialized.
pub fn render_metrics() -> Option<String> {
    PROMETHEUS_HANDLE.get().map(|handle| handle.render())
}

/// Log a cache stats line every `interval` until `shutdown` is cancelled.
pub fn spawn_stats_reporter(
    cache: Arc<TieredCache>,
    interval: Duration,
    shutdown: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        // First tick fires immediately
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {
                    let stats = cache.stats();
                    tracing::info!(
                        l1_hits = stats.l1_hits,
                        l2_hits = stats.l2_hits,
                        misses = stats.misses,
                        errors = stats.errors,
                        hit_rate = %format!("{:.1}%", stats.hit_rate()),
                        l1_entries = cache.memory().len(),
                        "Cache stats"
                    );
                }
            }
        }
    })
}
