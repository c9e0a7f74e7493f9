//! Error types for cache operations

use thiserror::Error;

/// Result type for cache operations
pub type CacheResult<T> = Result<T, CacheError>;

/// Errors that can occur during cache operations.
///
/// Read paths (`get`, `exists`) only ever surface [`CacheError::InvalidKey`];
/// backend and decoding failures on reads degrade to a miss.
#[derive(Debug, Error)]
pub enum CacheError {
    /// Empty or blank key, rejected before any I/O
    #[error("Invalid cache key: {0}")]
    InvalidKey(String),

    /// The distributed (L2) store failed
    #[error("{backend} error: {message}")]
    Backend {
        /// Name of the failing store (e.g. "redis")
        backend: &'static str,
        /// Description of the failure
        message: String,
    },

    /// A value could not be encoded for L2
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// An L2 payload could not be decoded into the requested type
    #[error("Deserialization error: {0}")]
    Deserialization(String),

    /// The caller cancelled the operation while it awaited L2
    #[error("Cache operation cancelled")]
    Cancelled,

    /// Invalid cache configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// A warmup source failed to load
    #[error("Warmup source '{source_name}' failed: {message}")]
    Warmup {
        /// Name of the failing source
        source_name: String,
        /// Description of the failure
        message: String,
    },
}

impl CacheError {
    /// Creates a new `Backend` error.
    #[must_use]
    pub fn backend(backend: &'static str, message: impl Into<String>) -> Self {
        Self::Backend {
            backend,
            message: message.into(),
        }
    }

    /// Creates a new `Config` error.
    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Creates a new `Warmup` error.
    #[must_use]
    pub fn warmup(source_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Warmup {
            source_name: source_name.into(),
            message: message.into(),
        }
    }

    /// Returns `true` if this is a transient backend failure.
    #[must_use]
    pub fn is_backend(&self) -> bool {
        matches!(self, Self::Backend { .. })
    }
}

impl From<redis::RedisError> for CacheError {
    fn from(err: redis::RedisError) -> Self {
        CacheError::backend("redis", err.to_string())
    }
}

impl From<deadpool_redis::PoolError> for CacheError {
    fn from(err: deadpool_redis::PoolError) -> Self {
        CacheError::backend("redis", format!("connection pool: {err}"))
    }
}

/// Reject empty or whitespace-only keys.
pub(crate) fn validate_key(key: &str) -> CacheResult<()> {
    if key.trim().is_empty() {
        return Err(CacheError::InvalidKey(
            "cache key must not be empty".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_key() {
        assert!(validate_key("product:42").is_ok());
        assert!(matches!(validate_key(""), Err(CacheError::InvalidKey(_))));
        assert!(matches!(validate_key("   "), Err(CacheError::InvalidKey(_))));
    }

    #[test]
    fn test_backend_error_display() {
        let err = CacheError::backend("redis", "connection refused");
        assert_eq!(err.to_string(), "redis error: connection refused");
        assert!(err.is_backend());
        assert!(!CacheError::Cancelled.is_backend());
    }
}
