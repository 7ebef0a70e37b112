use super::util::{build_url, get_text, http_client};
use crate::core::error::SourceError;
use crate::core::geo::{Coordinates, Geocoder, TimezoneLookup};
use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, instrument};

#[derive(Debug, Deserialize)]
struct GeocodingResponse {
    #[serde(default)]
    results: Vec<GeocodingResult>,
}

#[derive(Debug, Deserialize)]
struct GeocodingResult {
    latitude: f64,
    longitude: f64,
    name: Option<String>,
}

/// Open-Meteo geocoding search, used as the fallback geocoder.
pub struct OpenMeteoGeocoder {
    base_url: String,
    client: reqwest::Client,
}

impl OpenMeteoGeocoder {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.to_string(),
            client: http_client(),
        }
    }
}

#[async_trait]
impl Geocoder for OpenMeteoGeocoder {
    fn name(&self) -> &str {
        "open-meteo"
    }

    #[instrument(name = "OpenMeteoGeocode", skip(self))]
    async fn geocode(&self, query: &str) -> Result<Coordinates, SourceError> {
        let url = build_url(
            &self.base_url,
            "/v1/search",
            &[("name", query), ("count", "1"), ("format", "json")],
        )?;
        let body = get_text(&self.client, url).await?;

        let response: GeocodingResponse = serde_json::from_str(&body)
            .map_err(|e| SourceError::Transient(format!("malformed geocoder payload: {e}")))?;
        let result = response
            .results
            .first()
            .ok_or_else(|| SourceError::NotFound(format!("no place matches '{query}'")))?;

        debug!(
            "Geocoded '{}' as {}",
            query,
            result.name.as_deref().unwrap_or(query)
        );
        Ok(Coordinates {
            latitude: result.latitude,
            longitude: result.longitude,
        })
    }
}

#[derive(Debug, Deserialize)]
struct TimezoneResponse {
    utc_offset_seconds: Option<i64>,
    timezone: Option<String>,
}

/// Open-Meteo timezone lookup by coordinates.
pub struct OpenMeteoTimezone {
    base_url: String,
    client: reqwest::Client,
}

impl OpenMeteoTimezone {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.to_string(),
            client: http_client(),
        }
    }
}

#[async_trait]
impl TimezoneLookup for OpenMeteoTimezone {
    #[instrument(name = "OpenMeteoTimezone", skip(self))]
    async fn utc_offset_minutes(&self, coordinates: Coordinates) -> Result<i32, SourceError> {
        let latitude = coordinates.latitude.to_string();
        let longitude = coordinates.longitude.to_string();
        let url = build_url(
            &self.base_url,
            "/v1/timezone",
            &[("latitude", latitude.as_str()), ("longitude", longitude.as_str())],
        )?;
        let body = get_text(&self.client, url).await?;

        let response: TimezoneResponse = serde_json::from_str(&body)
            .map_err(|e| SourceError::Transient(format!("malformed timezone payload: {e}")))?;
        let offset_seconds = response
            .utc_offset_seconds
            .ok_or_else(|| SourceError::Transient("utc_offset_seconds missing".into()))?;

        let offset_minutes = offset_seconds.div_euclid(60) as i32;
        debug!(
            "Timezone {} has offset {} minutes",
            response.timezone.as_deref().unwrap_or("unknown"),
            offset_minutes
        );
        Ok(offset_minutes)
    }
}
