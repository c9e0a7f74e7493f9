//! Storefront backend process.
//!
//! Loads [`config::AppConfig`], initialises tracing and the Prometheus
//! recorder, then wires the tiered cache, the catalog services and the
//! startup warmup together in [`App`].

pub mod app;
pub mod config;
pub mod metrics;
pub mod observability;

pub use app::{App, AppBuilder};
pub use config::AppConfig;
