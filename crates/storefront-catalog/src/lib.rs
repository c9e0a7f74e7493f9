//! # storefront-catalog
//!
//! Catalog services that read through the storefront cache.
//!
//! Every read is cache-aside: the service asks the [`TieredCache`], calls its
//! repository on a miss and writes the result back. Every write goes to the
//! repository first and then invalidates the affected keys (see [`keys`]).
//!
//! [`TieredCache`]: storefront_cache::TieredCache

pub mod aggregator;
pub mod cache_aside;
pub mod customers;
pub mod error;
pub mod keys;
pub mod model;
pub mod orders;
pub mod products;
pub mod repository;
pub mod settings;
pub mod warmup;

pub use aggregator::AggregatorService;
pub use cache_aside::EntryTtl;
pub use customers::CustomerService;
pub use error::{CatalogError, CatalogResult};
pub use model::{Category, Customer, CustomerSummary, Order, OrderLine, Page, Product, StoreSettings};
pub use orders::OrderService;
pub use products::ProductService;
pub use repository::{
    CategoryRepository, CustomerRepository, Entity, InMemoryCatalog, InMemoryRepository,
    InMemorySettingsRepository, OrderRepository, ProductRepository, Repository, RepositoryCalls,
    SettingsRepository,
};
pub use settings::SettingsService;
pub use warmup::{ConfigWarmup, FrequentWarmup, ReferenceWarmup};
