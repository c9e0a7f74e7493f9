//! # storefront-cache
//!
//! Two-tier cache for the storefront backend.
//!
//! ## Overview
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                       TieredCache                         │
//! │  ┌──────────────┐    miss    ┌─────────────────────────┐ │
//! │  │ L1 (memory)  │ ─────────▶ │ L2 (Redis / in-memory)  │ │
//! │  │ typed values │ ◀───────── │ serialized payloads      │ │
//! │  └──────┬───────┘  promote   └────────────┬────────────┘ │
//! │         │                                  │ pub/sub      │
//! │     sweeper                     invalidation listener     │
//! └──────────────────────────────────────────────────────────┘
//!            ▲                           ▲
//!     WarmupCoordinator           CacheKeyIndex
//! ```
//!
//! - [`TieredCache`]: get/set/remove/remove-by-prefix/exists across both tiers
//! - [`WarmupCoordinator`]: populate well-known keys at startup, refresh by kind
//! - [`LocalCache`]: single-tier in-process cache for non-shared data
//! - [`CacheMetrics`]: counters for hits, misses, sets, evictions and errors
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use storefront_cache::{CachePolicy, InMemoryDistributedStore, MemoryStore, TieredCache};
//!
//! let cache = TieredCache::new(
//!     Arc::new(MemoryStore::new(10_000)),
//!     Arc::new(InMemoryDistributedStore::new()),
//!     CachePolicy::default(),
//! );
//!
//! cache.set("product:42", product, None, None).await?;
//! let cached: Option<Product> = cache.get("product:42").await?;
//! ```

pub mod codec;
pub mod config;
pub mod distributed;
pub mod entry;
pub mod error;
pub mod index;
pub mod local;
pub mod memory;
pub mod metrics;
pub mod sweeper;
pub mod tiered;
pub mod warmup;

// Re-export main types
pub use codec::SerializationFormat;
pub use config::{CacheConfig, RedisConfig};
pub use distributed::{
    DistributedStore, DynDistributedStore, InMemoryDistributedStore, RedisStore,
    create_distributed_store,
};
pub use entry::{CacheEntryInfo, CacheTier};
pub use error::{CacheError, CacheResult};
pub use index::CacheKeyIndex;
pub use local::LocalCache;
pub use memory::MemoryStore;
pub use metrics::{CacheLevel, CacheMetrics, CacheStats};
pub use sweeper::spawn_sweeper;
pub use tiered::{CacheHit, CachePolicy, TieredCache};
pub use warmup::{
    SourceOutcome, WarmupCoordinator, WarmupKind, WarmupReport, WarmupScope, WarmupSource,
    WarmupState,
};

// Re-export for users of the cancellable operations
pub use tokio_util::sync::CancellationToken;
