//! Order reads and writes.
//!
//! An order write touches three cached views: the order itself, the
//! customer's order list and the customer's summary.

use std::sync::Arc;

use storefront_cache::TieredCache;

use crate::cache_aside::{EntryTtl, invalidate, read_through};
use crate::error::{CatalogError, CatalogResult};
use crate::keys;
use crate::model::Order;
use crate::repository::OrderRepository;

pub struct OrderService {
    cache: Arc<TieredCache>,
    orders: Arc<dyn OrderRepository>,
}

impl OrderService {
    pub fn new(cache: Arc<TieredCache>, orders: Arc<dyn OrderRepository>) -> Self {
        Self { cache, orders }
    }

    /// Get an order by id (`order:{id}`).
    pub async fn get(&self, id: u64) -> CatalogResult<Order> {
        read_through(&self.cache, &keys::order(id), EntryTtl::DEFAULT, || {
            self.orders.get_by_id(id)
        })
        .await?
        .ok_or_else(|| CatalogError::not_found("order", id))
    }

    /// Orders of a customer (`orders:customer:{id}`). Empty if none.
    pub async fn list_for_customer(&self, customer_id: u64) -> CatalogResult<Vec<Order>> {
        let orders = read_through(
            &self.cache,
            &keys::customer_orders(customer_id),
            EntryTtl::LISTING,
            || async { self.orders.list_by_customer(customer_id).await.map(Some) },
        )
        .await?;
        Ok(orders.unwrap_or_default())
    }

    /// Store an order. It needs at least one line and no zero quantities.
    pub async fn place(&self, order: Order) -> CatalogResult<Order> {
        if order.lines.is_empty() {
            return Err(CatalogError::invalid_argument(format!(
                "order {} has no lines",
                order.id
            )));
        }
        if order.lines.iter().any(|line| line.quantity == 0) {
            return Err(CatalogError::invalid_argument(format!(
                "order {} has a zero-quantity line",
                order.id
            )));
        }

        let saved = self.orders.upsert(order).await?;
        self.invalidate(saved.id, saved.customer_id).await;
        tracing::debug!(
            order_id = saved.id,
            customer_id = saved.customer_id,
            total = saved.total(),
            "order placed"
        );
        Ok(saved)
    }

    /// Delete an order. Returns `false` if it did not exist.
    pub async fn delete(&self, id: u64) -> CatalogResult<bool> {
        // Read through the repository: the customer id decides which views go
        let Some(order) = self.orders.get_by_id(id).await? else {
            invalidate(&self.cache, &[keys::order(id)], &[]).await;
            return Ok(false);
        };

        let deleted = self.orders.delete(id).await?;
        self.invalidate(id, order.customer_id).await;
        Ok(deleted)
    }

    async fn invalidate(&self, order_id: u64, customer_id: u64) {
        invalidate(
            &self.cache,
            &[
                keys::order(order_id),
                keys::customer_orders(customer_id),
                keys::customer_summary(customer_id),
            ],
            &[],
        )
        .await;
    }
}
