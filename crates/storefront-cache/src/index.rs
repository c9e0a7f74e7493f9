//! Key index for prefix removal and warmup refresh.
//!
//! Two sets of keys are tracked:
//!
//! - keys written by warmup sources, partitioned by [`WarmupKind`]
//! - when enabled, every key written through `TieredCache::set`
//!
//! Neither is a general secondary index over L2: a key written by another
//! instance, or written here before the registry was enabled, is not known.

use std::collections::{BTreeSet, HashMap};

use dashmap::DashSet;
use parking_lot::RwLock;

use crate::warmup::WarmupKind;

#[derive(Default)]
pub struct CacheKeyIndex {
    by_kind: RwLock<HashMap<WarmupKind, BTreeSet<String>>>,
    tracked: DashSet<String>,
}

impl CacheKeyIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a warmup-written key under `kind`.
    pub fn register(&self, kind: WarmupKind, key: &str) {
        self.by_kind
            .write()
            .entry(kind)
            .or_default()
            .insert(key.to_string());
    }

    /// Record an ad-hoc key (full-registry mode).
    pub fn track(&self, key: &str) {
        self.tracked.insert(key.to_string());
    }

    /// Keys registered under `kind`, sorted.
    pub fn keys_for(&self, kind: WarmupKind) -> Vec<String> {
        self.by_kind
            .read()
            .get(&kind)
            .map(|keys| keys.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Drop and return every key registered under `kind`.
    pub fn take_kind(&self, kind: WarmupKind) -> Vec<String> {
        self.by_kind
            .write()
            .remove(&kind)
            .map(|keys| keys.into_iter().collect())
            .unwrap_or_default()
    }

    /// Forget a key everywhere.
    pub fn forget(&self, key: &str) {
        let mut by_kind = self.by_kind.write();
        for keys in by_kind.values_mut() {
            keys.remove(key);
        }
        by_kind.retain(|_, keys| !keys.is_empty());
        drop(by_kind);
        self.tracked.remove(key);
    }

    /// Every known key (warmup or tracked) starting with `prefix`.
    pub fn keys_with_prefix(&self, prefix: &str) -> BTreeSet<String> {
        let mut keys: BTreeSet<String> = self
            .by_kind
            .read()
            .values()
            .flat_map(|keys| keys.iter())
            .filter(|key| key.starts_with(prefix))
            .cloned()
            .collect();
        keys.extend(
            self.tracked
                .iter()
                .filter(|key| key.starts_with(prefix))
                .map(|key| key.key().clone()),
        );
        keys
    }

    pub fn contains(&self, key: &str) -> bool {
        self.tracked.contains(key) || self.by_kind.read().values().any(|keys| keys.contains(key))
    }

    /// Number of warmup-registered keys under `kind`.
    pub fn len_for(&self, kind: WarmupKind) -> usize {
        self.by_kind.read().get(&kind).map_or(0, BTreeSet::len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_and_take_kind() {
        let index = CacheKeyIndex::new();
        index.register(WarmupKind::Reference, "reference:categories");
        index.register(WarmupKind::Reference, "products:page:1:size:20");
        index.register(WarmupKind::Frequent, "product:1");

        assert_eq!(index.len_for(WarmupKind::Reference), 2);
        let taken = index.take_kind(WarmupKind::Reference);
        assert_eq!(
            taken,
            vec!["products:page:1:size:20", "reference:categories"]
        );
        assert_eq!(index.len_for(WarmupKind::Reference), 0);
        assert_eq!(index.keys_for(WarmupKind::Frequent), vec!["product:1"]);
    }

    #[test]
    fn test_keys_with_prefix_merges_tracked() {
        let index = CacheKeyIndex::new();
        index.register(WarmupKind::Reference, "products:page:1:size:20");
        index.track("products:page:2:size:20");
        index.track("product:7");

        let keys: Vec<_> = index.keys_with_prefix("products:").into_iter().collect();
        assert_eq!(
            keys,
            vec!["products:page:1:size:20", "products:page:2:size:20"]
        );
    }

    #[test]
    fn test_forget() {
        let index = CacheKeyIndex::new();
        index.register(WarmupKind::Config, "config:store-settings");
        index.track("config:store-settings");
        assert!(index.contains("config:store-settings"));

        index.forget("config:store-settings");
        assert!(!index.contains("config:store-settings"));
        assert_eq!(index.len_for(WarmupKind::Config), 0);
    }
}
