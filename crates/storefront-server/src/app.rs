//! Process wiring: cache tiers, catalog services, warmup and background tasks.

use std::future::Future;
use std::sync::Arc;

use anyhow::Context;
use storefront_cache::{
    CacheMetrics, CachePolicy, LocalCache, MemoryStore, TieredCache, WarmupCoordinator,
    create_distributed_store, spawn_sweeper,
};
use storefront_catalog::{
    AggregatorService, ConfigWarmup, CustomerService, FrequentWarmup, InMemoryCatalog,
    OrderService, ProductService, ReferenceWarmup, SettingsService,
};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::config::AppConfig;
use crate::metrics::spawn_stats_reporter;

#[derive(Default)]
pub struct AppBuilder {
    config: Option<AppConfig>,
    catalog: Option<InMemoryCatalog>,
}

impl AppBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(mut self, config: AppConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Repositories to serve from. Defaults to the demo data set.
    pub fn with_catalog(mut self, catalog: InMemoryCatalog) -> Self {
        self.catalog = Some(catalog);
        self
    }

    pub async fn build(self) -> anyhow::Result<App> {
        let config = self.config.unwrap_or_default();
        config
            .validate()
            .map_err(anyhow::Error::msg)
            .context("invalid configuration")?;
        let catalog = self.catalog.unwrap_or_else(InMemoryCatalog::demo);
        let shutdown = CancellationToken::new();

        // Cache tiers
        let memory = Arc::new(MemoryStore::new(config.cache.l1_max_entries));
        let distributed =
            create_distributed_store(&config.redis, &config.cache.namespace, &memory, &shutdown)
                .await;
        let metrics =
            Arc::new(CacheMetrics::new().with_key_tags(config.cache.tag_metrics_with_key));
        let cache = Arc::new(
            TieredCache::new(memory, distributed, CachePolicy::from(&config.cache))
                .with_metrics(Arc::clone(&metrics)),
        );
        tracing::info!(
            l2 = cache.distributed().name(),
            l1_max_entries = config.cache.l1_max_entries,
            format = config.cache.format.as_str(),
            "Tiered cache ready"
        );

        // Services
        let products = Arc::new(ProductService::new(
            Arc::clone(&cache),
            catalog.products.clone(),
            catalog.categories.clone(),
        ));
        let customers = Arc::new(CustomerService::new(
            Arc::clone(&cache),
            catalog.customers.clone(),
        ));
        let orders = Arc::new(OrderService::new(
            Arc::clone(&cache),
            catalog.orders.clone(),
        ));
        let aggregator = Arc::new(AggregatorService::new(
            Arc::clone(&cache),
            Arc::clone(&customers),
            Arc::clone(&orders),
        ));
        let local = LocalCache::new(
            Arc::new(MemoryStore::new(config.settings.max_entries)),
            config.settings.ttl(),
        )
        .with_metrics(metrics);
        let settings = Arc::new(SettingsService::new(
            Arc::new(local),
            catalog.settings.clone(),
            config.settings.ttl(),
        ));

        // Warmup
        let warmup = Arc::new(
            WarmupCoordinator::new(Arc::clone(&cache))
                .with_source(Arc::new(ReferenceWarmup::new(
                    catalog.categories.clone(),
                    catalog.products.clone(),
                    config.warmup.reference_page_size,
                )))
                .with_source(Arc::new(FrequentWarmup::new(
                    catalog.products.clone(),
                    config.warmup.hot_product_ids.clone(),
                )))
                .with_source(Arc::new(ConfigWarmup::new(catalog.settings.clone()))),
        );

        Ok(App {
            config,
            cache,
            catalog,
            products,
            customers,
            orders,
            aggregator,
            settings,
            warmup,
            shutdown,
            tasks: Vec::new(),
        })
    }
}

pub struct App {
    config: AppConfig,
    cache: Arc<TieredCache>,
    catalog: InMemoryCatalog,
    products: Arc<ProductService>,
    customers: Arc<CustomerService>,
    orders: Arc<OrderService>,
    aggregator: Arc<AggregatorService>,
    settings: Arc<SettingsService>,
    warmup: Arc<WarmupCoordinator>,
    shutdown: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
}

impl App {
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn cache(&self) -> &Arc<TieredCache> {
        &self.cache
    }

    pub fn catalog(&self) -> &InMemoryCatalog {
        &self.catalog
    }

    pub fn products(&self) -> &Arc<ProductService> {
        &self.products
    }

    pub fn customers(&self) -> &Arc<CustomerService> {
        &self.customers
    }

    pub fn orders(&self) -> &Arc<OrderService> {
        &self.orders
    }

    pub fn aggregator(&self) -> &Arc<AggregatorService> {
        &self.aggregator
    }

    pub fn settings(&self) -> &Arc<SettingsService> {
        &self.settings
    }

    pub fn warmup(&self) -> &Arc<WarmupCoordinator> {
        &self.warmup
    }

    /// Spawn the background tasks: L1 sweeper, stats reporter and, when
    /// enabled, the startup warmup. Returns immediately; warmup failures are
    /// logged by the warmup task and never reach the caller.
    pub fn start(&mut self) {
        self.tasks.push(spawn_sweeper(
            Arc::clone(self.cache.memory()),
            Arc::clone(self.cache.distributed()),
            Arc::clone(self.cache.metrics()),
            self.config.cache.sweep_interval(),
            self.shutdown.clone(),
        ));

        if let Some(interval) = self.config.metrics.report_interval() {
            self.tasks.push(spawn_stats_reporter(
                Arc::clone(&self.cache),
                interval,
                self.shutdown.clone(),
            ));
        }

        if self.config.warmup.enabled {
            self.tasks.push(self.warmup.spawn_startup(self.shutdown.clone()));
        } else {
            tracing::info!("Cache warmup disabled");
        }
    }

    /// Start, wait for `signal`, then shut down.
    pub async fn run(mut self, signal: impl Future<Output = ()>) {
        self.start();
        tracing::info!("Storefront started");
        signal.await;
        self.shutdown().await;
    }

    /// Stop background tasks and wait for them to finish.
    pub async fn shutdown(self) {
        tracing::info!("Shutting down");
        self.shutdown.cancel();
        for task in self.tasks {
            if let Err(e) = task.await {
                tracing::warn!(error = %e, "Background task ended abnormally");
            }
        }

        let stats = self.cache.stats();
        tracing::info!(
            hits = stats.hits(),
            misses = stats.misses,
            errors = stats.errors,
            "Final cache stats"
        );
    }
}
