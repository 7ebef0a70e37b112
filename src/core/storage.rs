//! Persistence boundary for user settings and cached observations.

use crate::core::geo::GeocodeCacheEntry;
use crate::core::rate::RateRecord;
use crate::core::settings::{UserId, UserSettings};
use anyhow::Result;
use async_trait::async_trait;

/// Implementations must serialise concurrent writes to the same key; the last
/// write wins.
#[async_trait]
pub trait Storage: Send + Sync {
    async fn get_user_settings(&self, user_id: UserId) -> Result<Option<UserSettings>>;
    async fn save_user_settings(&self, settings: &UserSettings) -> Result<()>;

    /// Users with notifications enabled and every field a trigger needs.
    async fn get_all_enabled_users(&self) -> Result<Vec<UserSettings>>;

    async fn get_cached_rate(&self, currency_code: &str) -> Result<Option<RateRecord>>;
    async fn save_rate(&self, record: &RateRecord) -> Result<()>;

    async fn get_cached_geocode(&self, city_key: &str) -> Result<Option<GeocodeCacheEntry>>;
    async fn save_geocode(&self, entry: &GeocodeCacheEntry) -> Result<()>;
}
