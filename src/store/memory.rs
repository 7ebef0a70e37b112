use crate::core::geo::GeocodeCacheEntry;
use crate::core::rate::RateRecord;
use crate::core::settings::{UserId, UserSettings};
use crate::core::storage::Storage;
use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::Mutex;
use tracing::debug;

#[derive(Default)]
struct Tables {
    users: HashMap<UserId, UserSettings>,
    rates: HashMap<String, RateRecord>,
    geocodes: HashMap<String, GeocodeCacheEntry>,
}

/// Storage kept entirely in process memory.
#[derive(Default)]
pub struct MemoryStorage {
    inner: Mutex<Tables>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn get_user_settings(&self, user_id: UserId) -> Result<Option<UserSettings>> {
        Ok(self.inner.lock().await.users.get(&user_id).cloned())
    }

    async fn save_user_settings(&self, settings: &UserSettings) -> Result<()> {
        let mut tables = self.inner.lock().await;
        debug!("Store PUT user {}", settings.user_id);
        tables.users.insert(settings.user_id, settings.clone());
        Ok(())
    }

    async fn get_all_enabled_users(&self) -> Result<Vec<UserSettings>> {
        let tables = self.inner.lock().await;
        let mut users: Vec<UserSettings> = tables
            .users
            .values()
            .filter(|u| u.is_schedulable())
            .cloned()
            .collect();
        users.sort_by_key(|u| u.user_id);
        Ok(users)
    }

    async fn get_cached_rate(&self, currency_code: &str) -> Result<Option<RateRecord>> {
        Ok(self.inner.lock().await.rates.get(currency_code).cloned())
    }

    async fn save_rate(&self, record: &RateRecord) -> Result<()> {
        let mut tables = self.inner.lock().await;
        debug!("Store PUT rate {}", record.currency_code);
        tables
            .rates
            .insert(record.currency_code.clone(), record.clone());
        Ok(())
    }

    async fn get_cached_geocode(&self, city_key: &str) -> Result<Option<GeocodeCacheEntry>> {
        Ok(self.inner.lock().await.geocodes.get(city_key).cloned())
    }

    async fn save_geocode(&self, entry: &GeocodeCacheEntry) -> Result<()> {
        let mut tables = self.inner.lock().await;
        debug!("Store PUT geocode {}", entry.city_key);
        tables.geocodes.insert(entry.city_key.clone(), entry.clone());
        Ok(())
    }
}
