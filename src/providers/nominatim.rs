use super::util::{build_url, get_text, http_client};
use crate::core::error::SourceError;
use crate::core::geo::{Coordinates, Geocoder};
use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, instrument};

#[derive(Debug, Deserialize)]
struct NominatimPlace {
    lat: String,
    lon: String,
    display_name: Option<String>,
}

/// OpenStreetMap Nominatim search. Coordinates come back as strings.
pub struct NominatimGeocoder {
    base_url: String,
    client: reqwest::Client,
}

impl NominatimGeocoder {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.to_string(),
            client: http_client(),
        }
    }
}

fn parse_coordinate(raw: &str, field: &str) -> Result<f64, SourceError> {
    raw.trim()
        .parse()
        .map_err(|e| SourceError::Transient(format!("invalid {field} '{raw}': {e}")))
}

#[async_trait]
impl Geocoder for NominatimGeocoder {
    fn name(&self) -> &str {
        "nominatim"
    }

    #[instrument(name = "NominatimGeocode", skip(self))]
    async fn geocode(&self, query: &str) -> Result<Coordinates, SourceError> {
        let url = build_url(
            &self.base_url,
            "/search",
            &[("q", query), ("format", "json"), ("limit", "1")],
        )?;
        let body = get_text(&self.client, url).await?;

        let places: Vec<NominatimPlace> = serde_json::from_str(&body)
            .map_err(|e| SourceError::Transient(format!("malformed geocoder payload: {e}")))?;
        let place = places
            .first()
            .ok_or_else(|| SourceError::NotFound(format!("no place matches '{query}'")))?;

        let coordinates = Coordinates {
            latitude: parse_coordinate(&place.lat, "lat")?,
            longitude: parse_coordinate(&place.lon, "lon")?,
        };
        debug!(
            "Geocoded '{}' as {} -> {:?}",
            query,
            place.display_name.as_deref().unwrap_or(query),
            coordinates
        );
        Ok(coordinates)
    }
}
