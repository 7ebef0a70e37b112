//! Core business logic abstractions

pub mod cache;
pub mod clock;
pub mod config;
pub mod delivery;
pub mod error;
pub mod geo;
pub mod log;
pub mod rate;
pub mod settings;
pub mod storage;

// Re-export main types for cleaner imports
pub use clock::{Clock, ManualClock, SystemClock};
pub use delivery::Delivery;
pub use error::{RateError, ResolveError, SettingsError, SourceError};
pub use geo::{Coordinates, GeoLocation, GeocodeCacheEntry, Geocoder, TimezoneLookup};
pub use rate::{RateProvider, RateQuote, RateRecord, RateSource, Recency, SourceQuote, Trend};
pub use settings::{UserId, UserSettings};
pub use storage::Storage;
