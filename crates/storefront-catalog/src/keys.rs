//! Cache key layout.
//!
//! | Key | Value |
//! |-----|-------|
//! | `product:{id}` | [`Product`](crate::Product) |
//! | `products:page:{page}:size:{size}` | `Page<Product>` |
//! | `customer:{id}` | [`Customer`](crate::Customer) |
//! | `order:{id}` | [`Order`](crate::Order) |
//! | `orders:customer:{id}` | `Vec<Order>` |
//! | `summary:customer:{id}` | [`CustomerSummary`](crate::CustomerSummary) |
//! | `reference:categories` | `Vec<Category>` |
//! | `config:store-settings` | [`StoreSettings`](crate::StoreSettings) |

/// Prefix shared by every product listing page.
pub const PRODUCT_PAGES_PREFIX: &str = "products:page:";

pub const CATEGORIES: &str = "reference:categories";

pub const STORE_SETTINGS: &str = "config:store-settings";

pub fn product(id: u64) -> String {
    format!("product:{id}")
}

pub fn product_page(page: u32, size: u32) -> String {
    format!("{PRODUCT_PAGES_PREFIX}{page}:size:{size}")
}

pub fn customer(id: u64) -> String {
    format!("customer:{id}")
}

pub fn order(id: u64) -> String {
    format!("order:{id}")
}

pub fn customer_orders(customer_id: u64) -> String {
    format!("orders:customer:{customer_id}")
}

pub fn customer_summary(customer_id: u64) -> String {
    format!("summary:customer:{customer_id}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_layout() {
        assert_eq!(product(42), "product:42");
        assert_eq!(product_page(1, 20), "products:page:1:size:20");
        assert_eq!(customer_orders(7), "orders:customer:7");
        assert_eq!(customer_summary(7), "summary:customer:7");
    }

    #[test]
    fn test_page_prefix_does_not_match_single_products() {
        assert!(product_page(3, 50).starts_with(PRODUCT_PAGES_PREFIX));
        assert!(!product(3).starts_with(PRODUCT_PAGES_PREFIX));
    }
}
