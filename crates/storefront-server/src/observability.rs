//! Tracing setup with a log level that can be swapped after the config loads.
use std::sync::OnceLock;
use tracing_subscriber::{EnvFilter, fmt, prelude::*, reload};

static LOG_RELOAD_HANDLE: OnceLock<reload::Handle<EnvFilter, tracing_subscriber::Registry>> =
    OnceLock::new();

pub fn init_tracing() {
    init_tracing_with_level("info");
}

/// Install the global subscriber. `RUST_LOG`, when set and valid, wins over
/// `level`. Calling this again is a no-op.
pub fn init_tracing_with_level(level: &str) {
    let base_filter = std::env::var("RUST_LOG")
        .ok()
        .and_then(|_| EnvFilter::try_from_default_env().ok())
        .unwrap_or_else(|| EnvFilter::new(level));

    let (reload_layer, handle) = reload::Layer::new(base_filter);

    if let Err(e) = tracing_subscriber::registry()
        .with(reload_layer)
        .with(fmt::layer().with_target(true))
        .try_init()
    {
        tracing::debug!(error = %e, "Tracing subscriber already installed");
        return;
    }
    if LOG_RELOAD_HANDLE.set(handle).is_err() {
        tracing::debug!("Log level reload handle already set");
    }
}

/// Apply the configured logging level at runtime. `RUST_LOG`, when set,
/// keeps precedence.
pub fn apply_logging_level(level: &str) {
    if std::env::var_os("RUST_LOG").is_some() {
        tracing::debug!(level = %level, "RUST_LOG is set, keeping its filter");
        return;
    }
    let Some(handle) = LOG_RELOAD_HANDLE.get() else {
        tracing::debug!(level = %level, "Tracing not initialized, log level not applied");
        return;
    };
    match handle.modify(|filter| *filter = EnvFilter::new(level)) {
        Ok(()) => tracing::debug!(level = %level, "Log level applied"),
        Err(e) => tracing::debug!(level = %level, error = %e, "Failed to apply log level"),
    }
}
