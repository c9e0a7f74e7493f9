//! Warmup sources for the catalog keys.
//!
//! | Source | Kind | Keys |
//! |--------|------|------|
//! | [`ReferenceWarmup`] | reference | `reference:categories`, first product page |
//! | [`FrequentWarmup`] | frequent | `product:{id}` for the configured hot ids |
//! | [`ConfigWarmup`] | config | `config:store-settings` |

use std::sync::Arc;

use async_trait::async_trait;
use storefront_cache::{CacheError, CacheResult, WarmupKind, WarmupScope, WarmupSource};

use crate::cache_aside::EntryTtl;
use crate::error::CatalogError;
use crate::keys;
use crate::products::load_all_categories;
use crate::repository::{CategoryRepository, ProductRepository, SettingsRepository};

fn source_error(source: &str, err: CatalogError) -> CacheError {
    match err {
        CatalogError::Cache(e) => e,
        other => CacheError::warmup(source, other.to_string()),
    }
}

pub struct ReferenceWarmup {
    categories: Arc<dyn CategoryRepository>,
    products: Arc<dyn ProductRepository>,
    page_size: u32,
}

impl ReferenceWarmup {
    pub fn new(
        categories: Arc<dyn CategoryRepository>,
        products: Arc<dyn ProductRepository>,
        page_size: u32,
    ) -> Self {
        Self {
            categories,
            products,
            page_size,
        }
    }
}

#[async_trait]
impl WarmupSource for ReferenceWarmup {
    fn kind(&self) -> WarmupKind {
        WarmupKind::Reference
    }

    fn name(&self) -> &str {
        "catalog-reference"
    }

    async fn load(&self, scope: &WarmupScope<'_>) -> CacheResult<()> {
        let categories = load_all_categories(self.categories.as_ref())
            .await
            .map_err(|e| source_error(self.name(), e))?
            .unwrap_or_default();
        scope.put(keys::CATEGORIES, categories).await?;

        let first_page = self
            .products
            .list(1, self.page_size)
            .await
            .map_err(|e| source_error(self.name(), e))?;
        scope
            .put_with_ttl(
                &keys::product_page(1, self.page_size),
                first_page,
                EntryTtl::LISTING.l1,
                EntryTtl::LISTING.l2,
            )
            .await
    }
}

pub struct FrequentWarmup {
    products: Arc<dyn ProductRepository>,
    product_ids: Vec<u64>,
}

impl FrequentWarmup {
    pub fn new(products: Arc<dyn ProductRepository>, product_ids: Vec<u64>) -> Self {
        Self {
            products,
            product_ids,
        }
    }
}

#[async_trait]
impl WarmupSource for FrequentWarmup {
    fn kind(&self) -> WarmupKind {
        WarmupKind::Frequent
    }

    fn name(&self) -> &str {
        "catalog-frequent"
    }

    async fn load(&self, scope: &WarmupScope<'_>) -> CacheResult<()> {
        for &id in &self.product_ids {
            let product = self
                .products
                .get_by_id(id)
                .await
                .map_err(|e| source_error(self.name(), e))?;
            match product {
                Some(product) => scope.put(&keys::product(id), product).await?,
                None => tracing::debug!(product_id = id, "hot product not found, skipping"),
            }
        }
        Ok(())
    }
}

pub struct ConfigWarmup {
    settings: Arc<dyn SettingsRepository>,
}

impl ConfigWarmup {
    pub fn new(settings: Arc<dyn SettingsRepository>) -> Self {
        Self { settings }
    }
}

#[async_trait]
impl WarmupSource for ConfigWarmup {
    fn kind(&self) -> WarmupKind {
        WarmupKind::Config
    }

    fn name(&self) -> &str {
        "catalog-config"
    }

    async fn load(&self, scope: &WarmupScope<'_>) -> CacheResult<()> {
        let settings = self
            .settings
            .load()
            .await
            .map_err(|e| source_error(self.name(), e))?;
        scope.put(keys::STORE_SETTINGS, settings).await
    }
}
