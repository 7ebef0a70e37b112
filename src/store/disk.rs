use crate::core::geo::GeocodeCacheEntry;
use crate::core::rate::RateRecord;
use crate::core::settings::{UserId, UserSettings};
use crate::core::storage::Storage;
use anyhow::{Context, Result};
use async_trait::async_trait;
use fjall::{Config, Keyspace, PartitionCreateOptions, PartitionHandle, PersistMode};
use serde::{Serialize, de::DeserializeOwned};
use std::path::Path;
use tracing::debug;

/// Storage backed by a fjall keyspace with one partition per record kind.
/// Values are JSON documents; every write is synced before returning.
pub struct DiskStorage {
    keyspace: Keyspace,
    users: PartitionHandle,
    rates: PartitionHandle,
    geocodes: PartitionHandle,
}

impl DiskStorage {
    pub fn open(path: &Path) -> Result<Self> {
        std::fs::create_dir_all(path)
            .with_context(|| format!("Failed to create data directory: {}", path.display()))?;

        let keyspace = Config::new(path)
            .open()
            .with_context(|| format!("Failed to open keyspace at {}", path.display()))?;
        let open = |name: &str| {
            keyspace
                .open_partition(name, PartitionCreateOptions::default())
                .with_context(|| format!("Failed to open partition '{name}'"))
        };

        Ok(Self {
            users: open("users")?,
            rates: open("rates")?,
            geocodes: open("geocodes")?,
            keyspace,
        })
    }
}

fn read<V: DeserializeOwned>(partition: &PartitionHandle, key: &str) -> Result<Option<V>> {
    match partition.get(key)? {
        Some(bytes) => {
            debug!("Store HIT for key: {}", key);
            Ok(Some(serde_json::from_slice(&bytes).with_context(|| {
                format!("Failed to decode stored value for key: {key}")
            })?))
        }
        None => {
            debug!("Store MISS for key: {}", key);
            Ok(None)
        }
    }
}

impl DiskStorage {
    fn write<V: Serialize>(&self, partition: &PartitionHandle, key: &str, value: &V) -> Result<()> {
        partition.insert(key, serde_json::to_vec(value)?)?;
        self.keyspace
            .persist(PersistMode::SyncData)
            .context("Failed to persist keyspace")?;
        debug!("Store PUT for key: {}", key);
        Ok(())
    }
}

#[async_trait]
impl Storage for DiskStorage {
    async fn get_user_settings(&self, user_id: UserId) -> Result<Option<UserSettings>> {
        read(&self.users, &user_id.to_string())
    }

    async fn save_user_settings(&self, settings: &UserSettings) -> Result<()> {
        self.write(&self.users, &settings.user_id.to_string(), settings)
    }

    async fn get_all_enabled_users(&self) -> Result<Vec<UserSettings>> {
        let mut users = Vec::new();
        for item in self.users.iter() {
            let (key, value) = item?;
            let settings: UserSettings = serde_json::from_slice(&value).with_context(|| {
                format!(
                    "Failed to decode user settings for key: {}",
                    String::from_utf8_lossy(&key)
                )
            })?;
            if settings.is_schedulable() {
                users.push(settings);
            }
        }
        users.sort_by_key(|u| u.user_id);
        Ok(users)
    }

    async fn get_cached_rate(&self, currency_code: &str) -> Result<Option<RateRecord>> {
        read(&self.rates, currency_code)
    }

    async fn save_rate(&self, record: &RateRecord) -> Result<()> {
        self.write(&self.rates, &record.currency_code, record)
    }

    async fn get_cached_geocode(&self, city_key: &str) -> Result<Option<GeocodeCacheEntry>> {
        read(&self.geocodes, city_key)
    }

    async fn save_geocode(&self, entry: &GeocodeCacheEntry) -> Result<()> {
        self.write(&self.geocodes, &entry.city_key, entry)
    }
}
