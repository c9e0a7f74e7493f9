//! Data-source boundary.
//!
//! Services only call repositories on a cache miss or a write. The in-memory
//! implementations count their calls so tests can observe whether a read was
//! served by the cache, and can be switched off to simulate an outage.

use std::marker::PhantomData;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::RwLock;
use time::macros::datetime;

use crate::error::{CatalogError, CatalogResult};
use crate::model::{Category, Customer, Order, OrderLine, Page, Product, StoreSettings};

/// An entity addressable by a numeric id.
pub trait Entity: Clone + Send + Sync + 'static {
    /// Name used in errors and logs.
    const NAME: &'static str;

    fn id(&self) -> u64;
}

impl Entity for Product {
    const NAME: &'static str = "product";

    fn id(&self) -> u64 {
        self.id
    }
}

impl Entity for Category {
    const NAME: &'static str = "category";

    fn id(&self) -> u64 {
        self.id
    }
}

impl Entity for Customer {
    const NAME: &'static str = "customer";

    fn id(&self) -> u64 {
        self.id
    }
}

impl Entity for Order {
    const NAME: &'static str = "order";

    fn id(&self) -> u64 {
        self.id
    }
}

/// CRUD access to one entity type.
#[async_trait]
pub trait Repository<T: Entity>: Send + Sync {
    async fn get_by_id(&self, id: u64) -> CatalogResult<Option<T>>;

    /// List entities ordered by id. `page` is 1-based.
    async fn list(&self, page: u32, size: u32) -> CatalogResult<Page<T>>;

    /// Insert or replace by id.
    async fn upsert(&self, entity: T) -> CatalogResult<T>;

    /// Delete by id. Returns `true` if the entity existed.
    async fn delete(&self, id: u64) -> CatalogResult<bool>;
}

pub trait ProductRepository: Repository<Product> {}
impl<R: Repository<Product> + ?Sized> ProductRepository for R {}

pub trait CategoryRepository: Repository<Category> {}
impl<R: Repository<Category> + ?Sized> CategoryRepository for R {}

pub trait CustomerRepository: Repository<Customer> {}
impl<R: Repository<Customer> + ?Sized> CustomerRepository for R {}

#[async_trait]
pub trait OrderRepository: Repository<Order> {
    /// Orders placed by a customer, ordered by id.
    async fn list_by_customer(&self, customer_id: u64) -> CatalogResult<Vec<Order>>;
}

#[async_trait]
pub trait SettingsRepository: Send + Sync {
    async fn load(&self) -> CatalogResult<StoreSettings>;
}

/// Validate 1-based paging arguments.
pub fn validate_paging(page: u32, size: u32) -> CatalogResult<()> {
    if page == 0 {
        return Err(CatalogError::invalid_argument("page must be >= 1"));
    }
    if size == 0 || size > 500 {
        return Err(CatalogError::invalid_argument(
            "size must be between 1 and 500",
        ));
    }
    Ok(())
}

/// Call counters of an in-memory repository.
#[derive(Debug, Default)]
pub struct RepositoryCalls {
    pub get_by_id: AtomicUsize,
    pub list: AtomicUsize,
    pub upsert: AtomicUsize,
    pub delete: AtomicUsize,
    pub list_by_customer: AtomicUsize,
}

impl RepositoryCalls {
    /// Read calls (`get_by_id` + `list` + `list_by_customer`).
    pub fn reads(&self) -> usize {
        self.get_by_id.load(Ordering::SeqCst)
            + self.list.load(Ordering::SeqCst)
            + self.list_by_customer.load(Ordering::SeqCst)
    }

    pub fn writes(&self) -> usize {
        self.upsert.load(Ordering::SeqCst) + self.delete.load(Ordering::SeqCst)
    }
}

/// `DashMap`-backed repository.
pub struct InMemoryRepository<T: Entity> {
    rows: DashMap<u64, T>,
    calls: RepositoryCalls,
    available: AtomicBool,
    _entity: PhantomData<fn() -> T>,
}

impl<T: Entity> Default for InMemoryRepository<T> {
    fn default() -> Self {
        Self {
            rows: DashMap::new(),
            calls: RepositoryCalls::default(),
            available: AtomicBool::new(true),
            _entity: PhantomData,
        }
    }
}

impl<T: Entity> InMemoryRepository<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_rows(rows: impl IntoIterator<Item = T>) -> Self {
        let repo = Self::new();
        for row in rows {
            repo.rows.insert(row.id(), row);
        }
        repo
    }

    pub fn calls(&self) -> &RepositoryCalls {
        &self.calls
    }

    /// Simulate an outage: every call fails while unavailable.
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    fn check_available(&self) -> CatalogResult<()> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(CatalogError::repository(format!(
                "{} store unavailable",
                T::NAME
            )))
        }
    }

    fn sorted(&self, filter: impl Fn(&T) -> bool) -> Vec<T> {
        let mut rows: Vec<T> = self
            .rows
            .iter()
            .filter(|row| filter(row.value()))
            .map(|row| row.value().clone())
            .collect();
        rows.sort_by_key(|row| row.id());
        rows
    }
}

#[async_trait]
impl<T: Entity> Repository<T> for InMemoryRepository<T> {
    async fn get_by_id(&self, id: u64) -> CatalogResult<Option<T>> {
        self.calls.get_by_id.fetch_add(1, Ordering::SeqCst);
        self.check_available()?;
        Ok(self.rows.get(&id).map(|row| row.value().clone()))
    }

    async fn list(&self, page: u32, size: u32) -> CatalogResult<Page<T>> {
        self.calls.list.fetch_add(1, Ordering::SeqCst);
        self.check_available()?;
        validate_paging(page, size)?;

        let rows = self.sorted(|_| true);
        let total = rows.len() as u64;
        let skip = (page as usize - 1).saturating_mul(size as usize);
        let items = rows.into_iter().skip(skip).take(size as usize).collect();

        Ok(Page {
            items,
            page,
            size,
            total,
        })
    }

    async fn upsert(&self, entity: T) -> CatalogResult<T> {
        self.calls.upsert.fetch_add(1, Ordering::SeqCst);
        self.check_available()?;
        self.rows.insert(entity.id(), entity.clone());
        Ok(entity)
    }

    async fn delete(&self, id: u64) -> CatalogResult<bool> {
        self.calls.delete.fetch_add(1, Ordering::SeqCst);
        self.check_available()?;
        Ok(self.rows.remove(&id).is_some())
    }
}

#[async_trait]
impl OrderRepository for InMemoryRepository<Order> {
    async fn list_by_customer(&self, customer_id: u64) -> CatalogResult<Vec<Order>> {
        self.calls.list_by_customer.fetch_add(1, Ordering::SeqCst);
        self.check_available()?;
        Ok(self.sorted(|order| order.customer_id == customer_id))
    }
}

#[derive(Default)]
pub struct InMemorySettingsRepository {
    settings: RwLock<StoreSettings>,
    loads: AtomicUsize,
}

impl InMemorySettingsRepository {
    pub fn new(settings: StoreSettings) -> Self {
        Self {
            settings: RwLock::new(settings),
            loads: AtomicUsize::new(0),
        }
    }

    pub fn replace(&self, settings: StoreSettings) {
        *self.settings.write() = settings;
    }

    pub fn loads(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SettingsRepository for InMemorySettingsRepository {
    async fn load(&self) -> CatalogResult<StoreSettings> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        Ok(self.settings.read().clone())
    }
}

/// A full set of in-memory repositories.
#[derive(Clone)]
pub struct InMemoryCatalog {
    pub products: Arc<InMemoryRepository<Product>>,
    pub categories: Arc<InMemoryRepository<Category>>,
    pub customers: Arc<InMemoryRepository<Customer>>,
    pub orders: Arc<InMemoryRepository<Order>>,
    pub settings: Arc<InMemorySettingsRepository>,
}

impl InMemoryCatalog {
    pub fn empty() -> Self {
        Self {
            products: Arc::new(InMemoryRepository::new()),
            categories: Arc::new(InMemoryRepository::new()),
            customers: Arc::new(InMemoryRepository::new()),
            orders: Arc::new(InMemoryRepository::new()),
            settings: Arc::new(InMemorySettingsRepository::default()),
        }
    }

    /// Small demo data set: 3 categories, 30 products, 3 customers with orders.
    pub fn demo() -> Self {
        let categories = [(1, "Tools"), (2, "Garden"), (3, "Kitchen")]
            .into_iter()
            .map(|(id, name)| Category {
                id,
                name: name.to_string(),
            });

        let products = (1..=30_u64).map(|id| Product {
            id,
            sku: format!("SKU-{id:04}"),
            name: format!("Product {id}"),
            category_id: id % 3 + 1,
            unit_price: 199 + id * 100,
            tags: Vec::new(),
        });

        let customers = [(1, "Ada Lovelace"), (2, "Grace Hopper"), (3, "Alan Turing")]
            .into_iter()
            .map(|(id, name)| Customer {
                id,
                name: name.to_string(),
                email: format!("customer{id}@example.com"),
            });

        let orders = (1..=6_u64).map(|id| Order {
            id,
            customer_id: (id - 1) % 3 + 1,
            lines: vec![OrderLine {
                product_id: id,
                quantity: 1 + (id % 2) as u32,
                unit_price: 199 + id * 100,
            }],
            placed_at: datetime!(2024-01-15 09:00:00 UTC),
        });

        Self {
            products: Arc::new(InMemoryRepository::with_rows(products)),
            categories: Arc::new(InMemoryRepository::with_rows(categories)),
            customers: Arc::new(InMemoryRepository::with_rows(customers)),
            orders: Arc::new(InMemoryRepository::with_rows(orders)),
            settings: Arc::new(InMemorySettingsRepository::default()),
        }
    }
}
