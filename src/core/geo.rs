//! Geocoding and timezone abstractions

use crate::core::error::SourceError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

/// A resolved city: where it is and how far its clock is from UTC.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoLocation {
    pub latitude: f64,
    pub longitude: f64,
    pub utc_offset_minutes: i32,
}

/// Persistent record of a previous resolution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeocodeCacheEntry {
    pub city_key: String,
    pub latitude: f64,
    pub longitude: f64,
    pub utc_offset_minutes: i32,
    pub updated_at: DateTime<Utc>,
}

impl GeocodeCacheEntry {
    pub fn new(city_key: &str, location: GeoLocation, updated_at: DateTime<Utc>) -> Self {
        Self {
            city_key: city_key.to_string(),
            latitude: location.latitude,
            longitude: location.longitude,
            utc_offset_minutes: location.utc_offset_minutes,
            updated_at,
        }
    }

    pub fn location(&self) -> GeoLocation {
        GeoLocation {
            latitude: self.latitude,
            longitude: self.longitude,
            utc_offset_minutes: self.utc_offset_minutes,
        }
    }
}

/// Cache key for free-text city input: trimmed, lower-cased, single-spaced.
pub fn normalize_city_key(city_text: &str) -> String {
    city_text
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

#[async_trait]
pub trait Geocoder: Send + Sync {
    fn name(&self) -> &str;
    async fn geocode(&self, query: &str) -> Result<Coordinates, SourceError>;
}

#[async_trait]
pub trait TimezoneLookup: Send + Sync {
    async fn utc_offset_minutes(&self, coordinates: Coordinates) -> Result<i32, SourceError>;
}
