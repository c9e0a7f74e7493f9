//! Cache entry metadata shared by both tiers.

use std::fmt;
use std::time::{Duration, Instant};

/// Upper bound used when `now + ttl` would overflow `Instant`.
const FAR_FUTURE: Duration = Duration::from_secs(100 * 365 * 24 * 60 * 60);

/// Which store holds a copy of an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheTier {
    /// In-process store
    L1,
    /// Shared distributed store
    L2,
}

impl CacheTier {
    pub fn as_str(self) -> &'static str {
        match self {
            CacheTier::L1 => "L1",
            CacheTier::L2 => "L2",
        }
    }
}

impl fmt::Display for CacheTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Read-only view of an entry, used for inspection and tests.
#[derive(Debug, Clone)]
pub struct CacheEntryInfo {
    pub key: String,
    pub tier: CacheTier,
    pub created_at: Instant,
    pub expires_at: Instant,
}

impl CacheEntryInfo {
    /// TTL the entry was written with.
    pub fn ttl(&self) -> Duration {
        self.expires_at.saturating_duration_since(self.created_at)
    }

    /// Time left before the entry expires (zero once expired).
    pub fn remaining(&self) -> Duration {
        self.expires_at.saturating_duration_since(Instant::now())
    }

    pub fn is_expired(&self) -> bool {
        is_expired_at(self.expires_at, Instant::now())
    }
}

/// Absolute expiry for an entry written at `now` with `ttl`.
pub(crate) fn expires_after(now: Instant, ttl: Duration) -> Instant {
    now.checked_add(ttl)
        .or_else(|| now.checked_add(FAR_FUTURE))
        .unwrap_or(now)
}

/// An entry is expired once `now` reaches its expiry, so a zero TTL is
/// expired immediately.
#[inline]
pub(crate) fn is_expired_at(expires_at: Instant, now: Instant) -> bool {
    now >= expires_at
}
