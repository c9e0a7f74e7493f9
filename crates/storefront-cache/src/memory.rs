//! In-process (L1) entry store.
//!
//! Values are kept typed (`Arc<dyn Any>`) so L1 hits never pay for
//! deserialization. The store is bounded by entry count: when full, expired
//! entries are purged first, then the entry closest to expiry is evicted.

use std::any::Any;
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;

use crate::entry::{CacheEntryInfo, CacheTier, expires_after, is_expired_at};

/// A typed value with absolute expiry.
#[derive(Clone)]
struct MemoryEntry {
    value: Arc<dyn Any + Send + Sync>,
    created_at: Instant,
    expires_at: Instant,
}

impl MemoryEntry {
    fn is_expired_at(&self, now: Instant) -> bool {
        is_expired_at(self.expires_at, now)
    }
}

/// Outcome of an L1 lookup.
#[derive(Debug, PartialEq, Eq)]
pub enum MemoryRead<T> {
    /// Present, unexpired and of the requested type
    Hit(T),
    /// Present but expired; the entry has been removed
    Expired,
    /// Present but holding a different type
    TypeMismatch,
    /// Not present
    Absent,
}

/// Bounded in-process store with per-entry expiration.
pub struct MemoryStore {
    entries: DashMap<String, MemoryEntry>,
    max_entries: usize,
}

impl MemoryStore {
    /// Create a store holding at most `max_entries` entries.
    pub fn new(max_entries: usize) -> Self {
        Self {
            entries: DashMap::new(),
            max_entries: max_entries.max(1),
        }
    }

    pub fn max_entries(&self) -> usize {
        self.max_entries
    }

    /// Look up a typed value. Expired entries are removed on access.
    pub fn get<T>(&self, key: &str) -> MemoryRead<T>
    where
        T: Clone + Send + Sync + 'static,
    {
        let now = Instant::now();
        let Some(entry) = self.entries.get(key) else {
            return MemoryRead::Absent;
        };

        if entry.is_expired_at(now) {
            drop(entry);
            // Only drop it if nobody rewrote the key in the meantime
            self.entries
                .remove_if(key, |_, current| current.is_expired_at(now));
            return MemoryRead::Expired;
        }

        match entry.value.downcast_ref::<T>() {
            Some(value) => MemoryRead::Hit(value.clone()),
            None => MemoryRead::TypeMismatch,
        }
    }

    /// Insert or overwrite a value. Returns the number of entries evicted to
    /// make room.
    pub fn insert<T>(&self, key: &str, value: T, ttl: Duration) -> usize
    where
        T: Send + Sync + 'static,
    {
        let evicted = if self.entries.contains_key(key) {
            0
        } else {
            self.make_room()
        };

        let now = Instant::now();
        self.entries.insert(
            key.to_string(),
            MemoryEntry {
                value: Arc::new(value),
                created_at: now,
                expires_at: expires_after(now, ttl),
            },
        );
        evicted
    }

    /// Returns `true` if the key is present and unexpired.
    pub fn contains(&self, key: &str) -> bool {
        let now = Instant::now();
        self.entries
            .get(key)
            .is_some_and(|entry| !entry.is_expired_at(now))
    }

    /// Remove a key. Returns `true` if it was present.
    pub fn remove(&self, key: &str) -> bool {
        self.entries.remove(key).is_some()
    }

    /// Keys currently stored (expired or not) that start with `prefix`.
    pub fn keys_with_prefix(&self, prefix: &str) -> Vec<String> {
        self.entries
            .iter()
            .filter(|entry| entry.key().starts_with(prefix))
            .map(|entry| entry.key().clone())
            .collect()
    }

    /// Metadata for an unexpired entry.
    pub fn info(&self, key: &str) -> Option<CacheEntryInfo> {
        let now = Instant::now();
        self.entries
            .get(key)
            .filter(|entry| !entry.is_expired_at(now))
            .map(|entry| CacheEntryInfo {
                key: key.to_string(),
                tier: CacheTier::L1,
                created_at: entry.created_at,
                expires_at: entry.expires_at,
            })
    }

    /// Remove every expired entry. Returns the number removed.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut removed = 0;

        self.entries.retain(|_, entry| {
            if entry.is_expired_at(now) {
                removed += 1;
                false
            } else {
                true
            }
        });

        removed
    }

    pub fn clear(&self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn make_room(&self) -> usize {
        if self.entries.len() < self.max_entries {
            return 0;
        }

        let mut evicted = self.purge_expired();
        while self.entries.len() >= self.max_entries {
            let victim = self
                .entries
                .iter()
                .min_by_key(|entry| entry.expires_at)
                .map(|entry| entry.key().clone());
            match victim {
                Some(key) => {
                    if self.entries.remove(&key).is_some() {
                        tracing::debug!(key = %key, "evicted L1 entry (capacity)");
                        evicted += 1;
                    }
                }
                None => break,
            }
        }
        evicted
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new(10_000)
    }
}
