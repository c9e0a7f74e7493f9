//! Catalog data model.
//!
//! These are the values cached in L2, so field names are part of the stored
//! format: serialized in camelCase, renaming a field orphans existing entries
//! (they decode as misses and are repopulated).

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    pub id: u64,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: u64,
    pub sku: String,
    pub name: String,
    pub category_id: u64,
    /// Price in minor currency units
    pub unit_price: u64,
    #[serde(default)]
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Customer {
    pub id: u64,
    pub name: String,
    pub email: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderLine {
    pub product_id: u64,
    pub quantity: u32,
    pub unit_price: u64,
}

impl OrderLine {
    pub fn total(&self) -> u64 {
        self.unit_price.saturating_mul(u64::from(self.quantity))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: u64,
    pub customer_id: u64,
    pub lines: Vec<OrderLine>,
    #[serde(with = "time::serde::rfc3339")]
    pub placed_at: OffsetDateTime,
}

impl Order {
    pub fn total(&self) -> u64 {
        self.lines
            .iter()
            .fold(0_u64, |sum, line| sum.saturating_add(line.total()))
    }
}

/// One page of a listing. Pages are 1-based.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: u32,
    pub size: u32,
    pub total: u64,
}

impl<T> Page<T> {
    pub fn has_next(&self) -> bool {
        u64::from(self.page) * u64::from(self.size) < self.total
    }
}

/// Aggregated customer view: profile, orders and lifetime value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerSummary {
    pub customer: Customer,
    pub orders: Vec<Order>,
    pub order_count: usize,
    pub lifetime_value: u64,
}

impl CustomerSummary {
    pub fn new(customer: Customer, orders: Vec<Order>) -> Self {
        let lifetime_value = orders
            .iter()
            .fold(0_u64, |sum, order| sum.saturating_add(order.total()));
        Self {
            customer,
            order_count: orders.len(),
            orders,
            lifetime_value,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreSettings {
    pub currency: String,
    pub default_page_size: u32,
    pub free_shipping_threshold: u64,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            currency: "EUR".to_string(),
            default_page_size: 20,
            free_shipping_threshold: 5_000,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    fn order() -> Order {
        Order {
            id: 1,
            customer_id: 7,
            lines: vec![
                OrderLine {
                    product_id: 42,
                    quantity: 2,
                    unit_price: 1299,
                },
                OrderLine {
                    product_id: 43,
                    quantity: 1,
                    unit_price: 500,
                },
            ],
            placed_at: datetime!(2024-03-01 10:30:00 UTC),
        }
    }

    #[test]
    fn test_order_total() {
        assert_eq!(order().total(), 3098);
    }

    #[test]
    fn test_order_json_shape() {
        let json = serde_json::to_string(&order()).unwrap();
        insta::assert_snapshot!(json, @r#"{"id":1,"customerId":7,"lines":[{"productId":42,"quantity":2,"unitPrice":1299},{"productId":43,"quantity":1,"unitPrice":500}],"placedAt":"2024-03-01T10:30:00Z"}"#);
    }

    #[test]
    fn test_summary_totals() {
        let customer = Customer {
            id: 7,
            name: "Ada".to_string(),
            email: "ada@example.com".to_string(),
        };
        let summary = CustomerSummary::new(customer, vec![order(), order()]);
        assert_eq!(summary.order_count, 2);
        assert_eq!(summary.lifetime_value, 6196);
    }

    #[test]
    fn test_page_has_next() {
        let page = Page::<u8> {
            items: vec![],
            page: 1,
            size: 20,
            total: 21,
        };
        assert!(page.has_next());
        assert!(!Page::<u8> { page: 2, ..page }.has_next());
    }
}
