//! City name to coordinates and UTC offset, behind a memory and a persistent cache.

use crate::core::cache::TtlCache;
use crate::core::clock::Clock;
use crate::core::config::AppConfig;
use crate::core::error::{ResolveError, SourceError};
use crate::core::geo::{
    Coordinates, GeoLocation, GeocodeCacheEntry, Geocoder, TimezoneLookup, normalize_city_key,
};
use crate::core::storage::Storage;
use crate::providers::nominatim::NominatimGeocoder;
use crate::providers::open_meteo::{OpenMeteoGeocoder, OpenMeteoTimezone};
use crate::providers::util::{RetryPolicy, with_retry};
use chrono::Duration;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

pub const GEOCODE_TTL_HOURS: i64 = 24;

pub struct GeoResolver {
    memory: TtlCache<String, GeoLocation>,
    storage: Arc<dyn Storage>,
    primary: Arc<dyn Geocoder>,
    secondary: Arc<dyn Geocoder>,
    timezone: Arc<dyn TimezoneLookup>,
    policy: RetryPolicy,
    clock: Arc<dyn Clock>,
}

impl GeoResolver {
    pub fn new(
        memory: TtlCache<String, GeoLocation>,
        storage: Arc<dyn Storage>,
        primary: Arc<dyn Geocoder>,
        secondary: Arc<dyn Geocoder>,
        timezone: Arc<dyn TimezoneLookup>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            memory,
            storage,
            primary,
            secondary,
            timezone,
            policy: RetryPolicy::single_attempt(),
            clock,
        }
    }

    /// Nominatim first, Open-Meteo geocoding as the fallback.
    pub fn from_config(config: &AppConfig, storage: Arc<dyn Storage>, clock: Arc<dyn Clock>) -> Self {
        let providers = &config.providers;
        let memory = TtlCache::new(Duration::hours(GEOCODE_TTL_HOURS), Arc::clone(&clock));
        Self::new(
            memory,
            storage,
            Arc::new(NominatimGeocoder::new(&providers.nominatim.base_url)),
            Arc::new(OpenMeteoGeocoder::new(&providers.open_meteo_geocoding.base_url)),
            Arc::new(OpenMeteoTimezone::new(&providers.open_meteo_timezone.base_url)),
            clock,
        )
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    #[instrument(name = "ResolveCity", skip(self))]
    pub async fn resolve(&self, city_text: &str) -> Result<GeoLocation, ResolveError> {
        let key = normalize_city_key(city_text);
        if key.is_empty() {
            return Err(ResolveError::ResolutionFailed {
                city: city_text.to_string(),
                reason: "empty city name".into(),
            });
        }

        if let Some(location) = self.memory.get(&key).await {
            return Ok(location);
        }

        if let Some(entry) = self.persisted(&key).await {
            debug!(city = %key, "Backfilling memory cache from store");
            let location = entry.location();
            self.memory.put_at(key, location, entry.updated_at).await;
            return Ok(location);
        }

        let query = city_text.trim();
        let coordinates = match self.geocode(self.primary.as_ref(), query).await {
            Ok(c) => c,
            Err(primary_err) => match self.geocode(self.secondary.as_ref(), query).await {
                Ok(c) => c,
                Err(secondary_err) => {
                    return Err(ResolveError::ResolutionFailed {
                        city: query.to_string(),
                        reason: format!(
                            "{}: {}; {}: {}",
                            self.primary.name(),
                            primary_err,
                            self.secondary.name(),
                            secondary_err
                        ),
                    });
                }
            },
        };

        let offset = with_retry(|| self.timezone.utc_offset_minutes(coordinates), &self.policy)
            .await
            .map_err(|e| ResolveError::ResolutionFailed {
                city: query.to_string(),
                reason: format!("timezone lookup: {e}"),
            })?;

        let location = GeoLocation {
            latitude: coordinates.latitude,
            longitude: coordinates.longitude,
            utc_offset_minutes: offset,
        };
        let now = self.clock.now();
        if let Err(e) = self
            .storage
            .save_geocode(&GeocodeCacheEntry::new(&key, location, now))
            .await
        {
            warn!(city = %key, error = %e, "Failed to persist geocode");
        }
        self.memory.put_at(key.clone(), location, now).await;

        info!(
            city = %key,
            latitude = location.latitude,
            longitude = location.longitude,
            offset_minutes = offset,
            "Resolved city"
        );
        Ok(location)
    }

    async fn persisted(&self, key: &str) -> Option<GeocodeCacheEntry> {
        match self.storage.get_cached_geocode(key).await {
            Ok(Some(entry)) if self.memory.is_fresh(entry.updated_at) => Some(entry),
            Ok(Some(_)) => {
                debug!(city = %key, "Stored geocode expired");
                None
            }
            Ok(None) => None,
            Err(e) => {
                warn!(city = %key, error = %e, "Failed to read stored geocode");
                None
            }
        }
    }

    async fn geocode(&self, geocoder: &dyn Geocoder, query: &str) -> Result<Coordinates, SourceError> {
        let outcome = with_retry(|| geocoder.geocode(query), &self.policy).await;
        if let Err(e) = &outcome {
            warn!(geocoder = %geocoder.name(), error = %e, "Geocoder failed");
        }
        outcome
    }
}
