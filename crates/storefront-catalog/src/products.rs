//! Product reads and writes.

use std::sync::Arc;

use storefront_cache::TieredCache;

use crate::cache_aside::{EntryTtl, invalidate, read_through};
use crate::error::{CatalogError, CatalogResult};
use crate::keys;
use crate::model::{Category, Page, Product};
use crate::repository::{CategoryRepository, ProductRepository, validate_paging};

pub struct ProductService {
    cache: Arc<TieredCache>,
    products: Arc<dyn ProductRepository>,
    categories: Arc<dyn CategoryRepository>,
}

impl ProductService {
    pub fn new(
        cache: Arc<TieredCache>,
        products: Arc<dyn ProductRepository>,
        categories: Arc<dyn CategoryRepository>,
    ) -> Self {
        Self {
            cache,
            products,
            categories,
        }
    }

    /// Get a product by id (`product:{id}`).
    pub async fn get(&self, id: u64) -> CatalogResult<Product> {
        read_through(&self.cache, &keys::product(id), EntryTtl::DEFAULT, || {
            self.products.get_by_id(id)
        })
        .await?
        .ok_or_else(|| CatalogError::not_found("product", id))
    }

    /// One page of products ordered by id (`products:page:{page}:size:{size}`).
    ///
    /// Page keys are recorded in the key index so a product write can find
    /// them after their L1 copy is gone.
    pub async fn list(&self, page: u32, size: u32) -> CatalogResult<Page<Product>> {
        validate_paging(page, size)?;
        let key = keys::product_page(page, size);
        let listing = read_through(&self.cache, &key, EntryTtl::LISTING, || async {
            self.products.list(page, size).await.map(Some)
        })
        .await?;
        self.cache.key_index().track(&key);
        // The loader always yields a page
        listing.ok_or_else(|| CatalogError::repository("product listing returned nothing"))
    }

    /// Every category (`reference:categories`).
    pub async fn categories(&self) -> CatalogResult<Vec<Category>> {
        let categories = read_through(&self.cache, keys::CATEGORIES, EntryTtl::DEFAULT, || {
            load_all_categories(self.categories.as_ref())
        })
        .await?;
        Ok(categories.unwrap_or_default())
    }

    /// Create or replace a product, then drop its cached copy and every
    /// cached listing page.
    pub async fn upsert(&self, product: Product) -> CatalogResult<Product> {
        if product.name.trim().is_empty() {
            return Err(CatalogError::invalid_argument("product name is required"));
        }
        let saved = self.products.upsert(product).await?;
        self.invalidate(saved.id).await;
        tracing::debug!(product_id = saved.id, "product saved");
        Ok(saved)
    }

    /// Delete a product. Returns `true` if it existed.
    pub async fn delete(&self, id: u64) -> CatalogResult<bool> {
        let deleted = self.products.delete(id).await?;
        self.invalidate(id).await;
        Ok(deleted)
    }

    async fn invalidate(&self, id: u64) {
        invalidate(
            &self.cache,
            &[keys::product(id)],
            &[keys::PRODUCT_PAGES_PREFIX],
        )
        .await;
    }
}

/// Read every category page by page.
pub(crate) async fn load_all_categories(
    repo: &dyn CategoryRepository,
) -> CatalogResult<Option<Vec<Category>>> {
    const PAGE_SIZE: u32 = 100;

    let mut categories = Vec::new();
    let mut page = 1;
    loop {
        let batch = repo.list(page, PAGE_SIZE).await?;
        let has_next = batch.has_next();
        categories.extend(batch.items);
        if !has_next {
            break;
        }
        page += 1;
    }
    Ok(Some(categories))
}
