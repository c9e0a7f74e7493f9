//! Customer summary aggregation.

use std::sync::Arc;

use storefront_cache::TieredCache;

use crate::cache_aside::{EntryTtl, read_through};
use crate::customers::CustomerService;
use crate::error::{CatalogError, CatalogResult};
use crate::keys;
use crate::model::CustomerSummary;
use crate::orders::OrderService;

/// Builds [`CustomerSummary`] views from the customer and order services.
///
/// The summary is cached under `summary:customer:{id}` with a short TTL; the
/// customer and order services drop it on every write that changes it.
pub struct AggregatorService {
    cache: Arc<TieredCache>,
    customers: Arc<CustomerService>,
    orders: Arc<OrderService>,
}

impl AggregatorService {
    pub fn new(
        cache: Arc<TieredCache>,
        customers: Arc<CustomerService>,
        orders: Arc<OrderService>,
    ) -> Self {
        Self {
            cache,
            customers,
            orders,
        }
    }

    pub async fn customer_summary(&self, customer_id: u64) -> CatalogResult<CustomerSummary> {
        let summary = read_through(
            &self.cache,
            &keys::customer_summary(customer_id),
            EntryTtl::AGGREGATE,
            || async {
                let (customer, orders) = tokio::try_join!(
                    self.customers.get(customer_id),
                    self.orders.list_for_customer(customer_id),
                )?;
                Ok::<_, CatalogError>(Some(CustomerSummary::new(customer, orders)))
            },
        )
        .await?;

        // The loader never yields `None`; a missing customer is an error
        summary.ok_or_else(|| CatalogError::not_found("customer", customer_id))
    }
}
