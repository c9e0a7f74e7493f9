//! Catalog error types.

use storefront_cache::CacheError;

pub type CatalogResult<T> = Result<T, CatalogError>;

/// Errors returned by catalog services and repositories.
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    /// The requested entity does not exist.
    #[error("{entity} not found: {id}")]
    NotFound {
        /// Entity kind (e.g. "product")
        entity: &'static str,
        /// Requested identifier
        id: u64,
    },

    /// The data source failed.
    #[error("Repository error: {message}")]
    Repository { message: String },

    /// A cache operation failed where the caller needs the result.
    #[error(transparent)]
    Cache(#[from] CacheError),

    /// Bad request input (paging, empty order, ...).
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

impl CatalogError {
    #[must_use]
    pub fn not_found(entity: &'static str, id: u64) -> Self {
        Self::NotFound { entity, id }
    }

    #[must_use]
    pub fn repository(message: impl Into<String>) -> Self {
        Self::Repository {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }

    /// Returns `true` for `NotFound`.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}
