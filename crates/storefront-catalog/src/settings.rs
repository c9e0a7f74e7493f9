//! Store settings, held in the single-tier local cache.
//!
//! Settings are per-instance and cheap to reload, so they skip L2.

use std::sync::Arc;
use std::time::Duration;

use storefront_cache::LocalCache;

use crate::error::CatalogResult;
use crate::keys;
use crate::model::StoreSettings;
use crate::repository::SettingsRepository;

pub struct SettingsService {
    cache: Arc<LocalCache>,
    repo: Arc<dyn SettingsRepository>,
    ttl: Duration,
}

impl SettingsService {
    pub fn new(cache: Arc<LocalCache>, repo: Arc<dyn SettingsRepository>, ttl: Duration) -> Self {
        Self { cache, repo, ttl }
    }

    pub async fn current(&self) -> CatalogResult<StoreSettings> {
        self.cache
            .get_or_insert_with(keys::STORE_SETTINGS, Some(self.ttl), || self.repo.load())
            .await
    }

    /// Drop the cached settings so the next read reloads them.
    pub fn reload(&self) -> CatalogResult<()> {
        self.cache.remove(keys::STORE_SETTINGS)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use storefront_cache::MemoryStore;

    use crate::repository::InMemorySettingsRepository;

    fn service(repo: Arc<InMemorySettingsRepository>) -> SettingsService {
        let cache = LocalCache::new(Arc::new(MemoryStore::new(10)), Duration::from_secs(60));
        SettingsService::new(Arc::new(cache), repo, Duration::from_secs(60))
    }

    #[tokio::test]
    async fn test_settings_load_once_until_reload() {
        let repo = Arc::new(InMemorySettingsRepository::default());
        let settings = service(Arc::clone(&repo));

        assert_eq!(settings.current().await.unwrap().currency, "EUR");
        assert_eq!(settings.current().await.unwrap().currency, "EUR");
        assert_eq!(repo.loads(), 1);

        repo.replace(StoreSettings {
            currency: "USD".to_string(),
            ..StoreSettings::default()
        });
        assert_eq!(settings.current().await.unwrap().currency, "EUR");

        settings.reload().unwrap();
        assert_eq!(settings.current().await.unwrap().currency, "USD");
        assert_eq!(repo.loads(), 2);
    }
}
