//! Customer reads and writes.

use std::sync::Arc;

use storefront_cache::TieredCache;

use crate::cache_aside::{EntryTtl, invalidate, read_through};
use crate::error::{CatalogError, CatalogResult};
use crate::keys;
use crate::model::Customer;
use crate::repository::CustomerRepository;

pub struct CustomerService {
    cache: Arc<TieredCache>,
    customers: Arc<dyn CustomerRepository>,
}

impl CustomerService {
    pub fn new(cache: Arc<TieredCache>, customers: Arc<dyn CustomerRepository>) -> Self {
        Self { cache, customers }
    }

    /// Get a customer by id (`customer:{id}`).
    pub async fn get(&self, id: u64) -> CatalogResult<Customer> {
        read_through(&self.cache, &keys::customer(id), EntryTtl::DEFAULT, || {
            self.customers.get_by_id(id)
        })
        .await?
        .ok_or_else(|| CatalogError::not_found("customer", id))
    }

    /// Create or replace a customer. Drops the cached profile and summary.
    pub async fn upsert(&self, customer: Customer) -> CatalogResult<Customer> {
        if !customer.email.contains('@') {
            return Err(CatalogError::invalid_argument(format!(
                "invalid email for customer {}",
                customer.id
            )));
        }
        let saved = self.customers.upsert(customer).await?;
        self.invalidate(saved.id).await;
        Ok(saved)
    }

    pub async fn delete(&self, id: u64) -> CatalogResult<bool> {
        let deleted = self.customers.delete(id).await?;
        self.invalidate(id).await;
        Ok(deleted)
    }

    async fn invalidate(&self, id: u64) {
        invalidate(
            &self.cache,
            &[keys::customer(id), keys::customer_summary(id)],
            &[],
        )
        .await;
    }
}
