//! Cache metrics.
//!
//! Every event is counted twice: in per-instance atomics (for [`CacheStats`]
//! and tests) and through the `metrics` facade (exported by whichever
//! recorder the process installs, Prometheus in the server). Recording never
//! fails; without an installed recorder the facade calls are no-ops.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use metrics::{counter, gauge, histogram};

/// Metric names as constants for consistency.
pub mod names {
    pub const CACHE_HITS_TOTAL: &str = "cache_hits_total";
    pub const CACHE_MISSES_TOTAL: &str = "cache_misses_total";
    pub const CACHE_SETS_TOTAL: &str = "cache_sets_total";
    pub const CACHE_EVICTIONS_TOTAL: &str = "cache_evictions_total";
    pub const CACHE_ERRORS_TOTAL: &str = "cache_errors_total";
    pub const CACHE_HIT_RATIO: &str = "cache_hit_ratio";
    pub const CACHE_ENTRIES: &str = "cache_entries";
}

/// Tier label attached to metrics and spans.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheLevel {
    L1,
    L2,
    /// Operations touching both tiers (remove, miss after both lookups)
    Both,
}

impl CacheLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            CacheLevel::L1 => "L1",
            CacheLevel::L2 => "L2",
            CacheLevel::Both => "L1+L2",
        }
    }
}

impl fmt::Display for CacheLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Snapshot of cache counters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub l1_hits: u64,
    pub l2_hits: u64,
    pub misses: u64,
    pub l1_sets: u64,
    pub l2_sets: u64,
    pub l1_evictions: u64,
    pub l2_evictions: u64,
    pub errors: u64,
}

impl CacheStats {
    pub fn hits(&self) -> u64 {
        self.l1_hits + self.l2_hits
    }

    /// Calculate hit rate as a percentage.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits() + self.misses;
        if total == 0 {
            0.0
        } else {
            (self.hits() as f64 / total as f64) * 100.0
        }
    }
}

/// Per-instance counters plus facade emission.
#[derive(Debug, Default)]
pub struct CacheMetrics {
    l1_hits: AtomicU64,
    l2_hits: AtomicU64,
    misses: AtomicU64,
    l1_sets: AtomicU64,
    l2_sets: AtomicU64,
    l1_evictions: AtomicU64,
    l2_evictions: AtomicU64,
    errors: AtomicU64,
    tag_keys: bool,
}

impl CacheMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Label facade metrics with the cache key as well as the tier.
    pub fn with_key_tags(mut self, enabled: bool) -> Self {
        self.tag_keys = enabled;
        self
    }

    /// Record a cache hit.
    pub fn record_hit(&self, level: CacheLevel, key: &str) {
        match level {
            CacheLevel::L2 => self.l2_hits.fetch_add(1, Ordering::Relaxed),
            _ => self.l1_hits.fetch_add(1, Ordering::Relaxed),
        };
        self.emit(names::CACHE_HITS_TOTAL, level, key, 1);
        self.emit_hit_ratio();
    }

    /// Record a cache miss (both tiers consulted).
    pub fn record_miss(&self, key: &str) {
        self.misses.fetch_add(1, Ordering::Relaxed);
        self.emit(names::CACHE_MISSES_TOTAL, CacheLevel::Both, key, 1);
        self.emit_hit_ratio();
    }

    /// Record a successful write into one tier.
    pub fn record_set(&self, level: CacheLevel, key: &str) {
        match level {
            CacheLevel::L1 => {
                self.l1_sets.fetch_add(1, Ordering::Relaxed);
            }
            CacheLevel::L2 => {
                self.l2_sets.fetch_add(1, Ordering::Relaxed);
            }
            CacheLevel::Both => {
                self.l1_sets.fetch_add(1, Ordering::Relaxed);
                self.l2_sets.fetch_add(1, Ordering::Relaxed);
            }
        }
        self.emit(names::CACHE_SETS_TOTAL, level, key, 1);
    }

    /// Record `count` evictions (expiry, capacity or explicit removal).
    pub fn record_evictions(&self, level: CacheLevel, count: u64) {
        if count == 0 {
            return;
        }
        match level {
            CacheLevel::L1 => {
                self.l1_evictions.fetch_add(count, Ordering::Relaxed);
            }
            CacheLevel::L2 => {
                self.l2_evictions.fetch_add(count, Ordering::Relaxed);
            }
            CacheLevel::Both => {
                self.l1_evictions.fetch_add(count, Ordering::Relaxed);
                self.l2_evictions.fetch_add(count, Ordering::Relaxed);
            }
        }
        counter!(names::CACHE_EVICTIONS_TOTAL, "tier" => level.as_str()).increment(count);
    }

    /// Record a failed operation against a tier.
    pub fn record_error(&self, level: CacheLevel, key: &str) {
        self.errors.fetch_add(1, Ordering::Relaxed);
        self.emit(names::CACHE_ERRORS_TOTAL, level, key, 1);
    }

    /// Set the number of entries held by a tier.
    pub fn set_entries(&self, level: CacheLevel, count: usize) {
        gauge!(names::CACHE_ENTRIES, "tier" => level.as_str()).set(count as f64);
    }

    pub fn snapshot(&self) -> CacheStats {
        CacheStats {
            l1_hits: self.l1_hits.load(Ordering::Relaxed),
            l2_hits: self.l2_hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            l1_sets: self.l1_sets.load(Ordering::Relaxed),
            l2_sets: self.l2_sets.load(Ordering::Relaxed),
            l1_evictions: self.l1_evictions.load(Ordering::Relaxed),
            l2_evictions: self.l2_evictions.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
        }
    }

    fn emit(&self, name: &'static str, level: CacheLevel, key: &str, count: u64) {
        if self.tag_keys {
            counter!(name, "tier" => level.as_str(), "key" => key.to_string()).increment(count);
        } else {
            counter!(name, "tier" => level.as_str()).increment(count);
        }
    }

    fn emit_hit_ratio(&self) {
        histogram!(names::CACHE_HIT_RATIO).record(self.snapshot().hit_rate() / 100.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counts_by_tier() {
        let metrics = CacheMetrics::new();
        metrics.record_hit(CacheLevel::L1, "a");
        metrics.record_hit(CacheLevel::L2, "b");
        metrics.record_hit(CacheLevel::L2, "c");
        metrics.record_miss("d");
        metrics.record_set(CacheLevel::Both, "e");
        metrics.record_evictions(CacheLevel::L1, 3);
        metrics.record_error(CacheLevel::L2, "f");

        let stats = metrics.snapshot();
        assert_eq!(stats.l1_hits, 1);
        assert_eq!(stats.l2_hits, 2);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.l1_sets, 1);
        assert_eq!(stats.l2_sets, 1);
        assert_eq!(stats.l1_evictions, 3);
        assert_eq!(stats.l2_evictions, 0);
        assert_eq!(stats.errors, 1);
        assert_eq!(stats.hit_rate(), 75.0);
    }

    #[test]
    fn test_hit_rate_without_traffic() {
        assert_eq!(CacheStats::default().hit_rate(), 0.0);
    }

    #[test]
    fn test_level_labels() {
        assert_eq!(CacheLevel::L1.as_str(), "L1");
        assert_eq!(CacheLevel::Both.to_string(), "L1+L2");
    }
}
