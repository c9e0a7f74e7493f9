//! Cache and Redis configuration sections.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::codec::SerializationFormat;
use crate::error::{CacheError, CacheResult};

/// Tiered cache policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Default L1 TTL for `set` in seconds
    #[serde(default = "default_l1_ttl_secs")]
    pub l1_ttl_secs: u64,

    /// Default L2 TTL for `set` in seconds
    #[serde(default = "default_l2_ttl_secs")]
    pub l2_ttl_secs: u64,

    /// L1 TTL applied when an L2 hit is promoted, in seconds
    #[serde(default = "default_promotion_ttl_secs")]
    pub promotion_ttl_secs: u64,

    /// Local (L1) cache max entries
    #[serde(default = "default_l1_max_entries")]
    pub l1_max_entries: usize,

    /// Interval of the background L1 expiry sweep, in seconds
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,

    /// Record every key written through `set` so prefix removal can reach
    /// keys that only live in L2.
    /// Default: false (only warmup-registered and L1-resident keys are found)
    #[serde(default)]
    pub index_all_keys: bool,

    /// Encoding of L2 payloads
    #[serde(default)]
    pub format: SerializationFormat,

    /// Prefix applied to every L2 key
    #[serde(default = "default_namespace")]
    pub namespace: String,

    /// Label metrics with the cache key (high cardinality)
    #[serde(default)]
    pub tag_metrics_with_key: bool,
}

fn default_l1_ttl_secs() -> u64 {
    300 // 5 minutes
}

fn default_l2_ttl_secs() -> u64 {
    1800 // 30 minutes
}

fn default_promotion_ttl_secs() -> u64 {
    300
}

fn default_l1_max_entries() -> usize {
    10000
}

fn default_sweep_interval_secs() -> u64 {
    60
}

fn default_namespace() -> String {
    "storefront:".to_string()
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            l1_ttl_secs: default_l1_ttl_secs(),
            l2_ttl_secs: default_l2_ttl_secs(),
            promotion_ttl_secs: default_promotion_ttl_secs(),
            l1_max_entries: default_l1_max_entries(),
            sweep_interval_secs: default_sweep_interval_secs(),
            index_all_keys: false,
            format: SerializationFormat::default(),
            namespace: default_namespace(),
            tag_metrics_with_key: false,
        }
    }
}

impl CacheConfig {
    pub fn validate(&self) -> CacheResult<()> {
        if self.l1_max_entries == 0 {
            return Err(CacheError::config("cache.l1_max_entries must be > 0"));
        }
        if self.sweep_interval_secs == 0 {
            return Err(CacheError::config("cache.sweep_interval_secs must be > 0"));
        }
        if self.l1_ttl_secs > self.l2_ttl_secs {
            tracing::warn!(
                l1_ttl_secs = self.l1_ttl_secs,
                l2_ttl_secs = self.l2_ttl_secs,
                "cache.l1_ttl_secs exceeds cache.l2_ttl_secs; L1 copies may outlive L2"
            );
        }
        Ok(())
    }

    pub fn l1_ttl(&self) -> Duration {
        Duration::from_secs(self.l1_ttl_secs)
    }

    pub fn l2_ttl(&self) -> Duration {
        Duration::from_secs(self.l2_ttl_secs)
    }

    pub fn promotion_ttl(&self) -> Duration {
        Duration::from_secs(self.promotion_ttl_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}

/// Redis (L2) connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedisConfig {
    /// Enable Redis (gracefully degrades without it)
    /// Default: false (in-memory L2 for single-instance deployments)
    #[serde(default = "default_redis_enabled")]
    pub enabled: bool,

    /// Redis connection URL (e.g., "redis://localhost:6379")
    #[serde(default = "default_redis_url")]
    pub url: String,

    /// Connection pool size
    #[serde(default = "default_redis_pool_size")]
    pub pool_size: usize,

    /// Connection timeout in milliseconds
    #[serde(default = "default_redis_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_redis_enabled() -> bool {
    false
}

fn default_redis_url() -> String {
    "redis://localhost:6379".to_string()
}

fn default_redis_pool_size() -> usize {
    10
}

fn default_redis_timeout_ms() -> u64 {
    5000
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            enabled: default_redis_enabled(),
            url: default_redis_url(),
            pool_size: default_redis_pool_size(),
            timeout_ms: default_redis_timeout_ms(),
        }
    }
}

impl RedisConfig {
    pub fn validate(&self) -> CacheResult<()> {
        if !self.enabled {
            return Ok(());
        }
        if self.url.is_empty() {
            return Err(CacheError::config("redis.url must not be empty when redis.enabled=true"));
        }
        if self.pool_size == 0 {
            return Err(CacheError::config("redis.pool_size must be > 0"));
        }
        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cfg = CacheConfig::default();
        assert_eq!(cfg.l1_ttl(), Duration::from_secs(300));
        assert_eq!(cfg.l2_ttl(), Duration::from_secs(1800));
        assert_eq!(cfg.promotion_ttl(), Duration::from_secs(300));
        assert_eq!(cfg.format, SerializationFormat::Json);
        assert!(!cfg.index_all_keys);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_partial_section_uses_field_defaults() {
        let cfg: CacheConfig = from_json(r#"{"l1_max_entries": 5, "format": "msgpack"}"#);
        assert_eq!(cfg.l1_max_entries, 5);
        assert_eq!(cfg.format, SerializationFormat::MessagePack);
        assert_eq!(cfg.l2_ttl_secs, 1800);
        assert_eq!(cfg.namespace, "storefront:");
    }

    #[test]
    fn test_validate_rejects_zero_capacity() {
        let cfg = CacheConfig {
            l1_max_entries: 0,
            ..Default::default()
        };
        let err = cfg.validate().unwrap_err();
        assert!(matches!(err, CacheError::Config(_)));
        assert_eq!(
            err.to_string(),
            "Configuration error: cache.l1_max_entries must be > 0"
        );
    }

    #[test]
    fn test_redis_validate() {
        assert!(RedisConfig::default().validate().is_ok());
        let cfg = RedisConfig {
            enabled: true,
            pool_size: 0,
            ..Default::default()
        };
        assert!(cfg.validate().is_err());
    }

    fn from_json(json: &str) -> CacheConfig {
        serde_json::from_str(json).unwrap()
    }
}
