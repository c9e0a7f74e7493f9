use serde::{Deserialize, Serialize};
use std::time::Duration;
use storefront_cache::{CacheConfig, RedisConfig};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    /// Tiered cache policy
    #[serde(default)]
    pub cache: CacheConfig,
    /// Redis (L2) connection
    #[serde(default)]
    pub redis: RedisConfig,
    /// Startup warmup
    #[serde(default)]
    pub warmup: WarmupConfig,
    /// Store settings local cache
    #[serde(default)]
    pub settings: SettingsCacheConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
}

impl AppConfig {
    pub fn validate(&self) -> Result<(), String> {
        self.cache
            .validate()
            .map_err(|e| format!("cache config error: {e}"))?;
        self.redis
            .validate()
            .map_err(|e| format!("redis config error: {e}"))?;
        // Warmup validation
        if self.warmup.reference_page_size == 0 {
            return Err("warmup.reference_page_size must be > 0".into());
        }
        // Settings cache validation
        if self.settings.max_entries == 0 {
            return Err("settings.max_entries must be > 0".into());
        }
        // Logging validation
        let lvl = self.logging.level.to_ascii_lowercase();
        let valid_levels = ["trace", "debug", "info", "warn", "error", "off"];
        if !valid_levels.contains(&lvl.as_str()) {
            return Err(format!("logging.level must be one of {valid_levels:?}"));
        }
        Ok(())
    }

    /// Effective configuration as TOML.
    pub fn to_toml(&self) -> Result<String, String> {
        toml::to_string_pretty(self).map_err(|e| format!("config serialize error: {e}"))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WarmupConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Products preloaded as "frequent" keys
    #[serde(default = "default_hot_product_ids")]
    pub hot_product_ids: Vec<u64>,
    /// Page size of the preloaded first product page
    #[serde(default = "default_reference_page_size")]
    pub reference_page_size: u32,
}

fn default_true() -> bool {
    true
}

fn default_hot_product_ids() -> Vec<u64> {
    vec![1, 2, 3, 4, 5]
}

fn default_reference_page_size() -> u32 {
    20
}

impl Default for WarmupConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            hot_product_ids: default_hot_product_ids(),
            reference_page_size: default_reference_page_size(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettingsCacheConfig {
    #[serde(default = "default_settings_ttl_secs")]
    pub ttl_secs: u64,
    #[serde(default = "default_settings_max_entries")]
    pub max_entries: usize,
}

fn default_settings_ttl_secs() -> u64 {
    600
}

fn default_settings_max_entries() -> usize {
    1000
}

impl Default for SettingsCacheConfig {
    fn default() -> Self {
        Self {
            ttl_secs: default_settings_ttl_secs(),
            max_entries: default_settings_max_entries(),
        }
    }
}

impl SettingsCacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "info".into()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    /// Install the Prometheus recorder
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Interval of the cache stats log line; 0 disables it
    #[serde(default = "default_report_interval_secs")]
    pub report_interval_secs: u64,
}

fn default_report_interval_secs() -> u64 {
    60
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            report_interval_secs: default_report_interval_secs(),
        }
    }
}

impl MetricsConfig {
    pub fn report_interval(&self) -> Option<Duration> {
        (self.report_interval_secs > 0).then(|| Duration::from_secs(self.report_interval_secs))
    }
}

pub mod loader {
    use super::AppConfig;
    use config::{Config, Environment, File};
    use std::path::{Path, PathBuf};

    pub const DEFAULT_CONFIG_PATH: &str = "storefront.toml";

    pub fn load_config(path: Option<&str>) -> Result<AppConfig, String> {
        let mut builder = Config::builder();
        let pathbuf = PathBuf::from(path.unwrap_or(DEFAULT_CONFIG_PATH));
        if pathbuf.exists() {
            builder = builder.add_source(File::from(pathbuf));
        } else if path.is_some() {
            tracing::warn!(path = %pathbuf.display(), "Config file not found, using defaults");
        }
        // Environment variable overrides, e.g., STOREFRONT__CACHE__L1_TTL_SECS=120
        builder = builder.add_source(
            Environment::with_prefix("STOREFRONT")
                .try_parsing(true)
                .separator("__"),
        );
        let cfg = builder
            .build()
            .map_err(|e| format!("config build error: {e}"))?;
        let merged: AppConfig = cfg
            .try_deserialize()
            .map_err(|e| format!("config deserialize error: {e}"))?;
        // Validate
        merged.validate()?;
        Ok(merged)
    }

    pub fn load_config_with_default_path<P: AsRef<Path>>(
        path: Option<P>,
    ) -> Result<AppConfig, String> {
        let p = path
            .as_ref()
            .map(|p| p.as_ref().to_string_lossy().to_string());
        load_config(p.as_deref())
    }
}
