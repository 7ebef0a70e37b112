//! Error taxonomy shared by the rate sources, geocoders and their callers.

/// Failure of a single upstream call.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SourceError {
    /// Network error, timeout or malformed payload. Worth another attempt.
    #[error("transient failure: {0}")]
    Transient(String),

    /// The payload was well formed but does not carry the requested item.
    #[error("not found: {0}")]
    NotFound(String),
}

impl SourceError {
    /// Whether the same source should be asked again.
    pub fn is_retryable(&self) -> bool {
        matches!(self, SourceError::Transient(_))
    }
}

impl From<reqwest::Error> for SourceError {
    fn from(err: reqwest::Error) -> Self {
        SourceError::Transient(err.to_string())
    }
}

/// Raised by the rate acquisition engine.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RateError {
    /// Every source in the chain was exhausted.
    #[error("could not acquire {currency} rate: {reasons}")]
    AcquisitionFailed { currency: String, reasons: String },
}

/// Raised by the geocode/timezone resolver.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ResolveError {
    /// Both geocoders failed or the timezone lookup failed.
    #[error("could not resolve '{city}': {reason}")]
    ResolutionFailed { city: String, reason: String },
}

/// Rejected user settings input.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SettingsError {
    #[error("invalid UTC offset '{0}', expected something like UTC+3, GMT-5 or UTC+4:30")]
    InvalidOffset(String),

    #[error("invalid currency code '{0}', expected three letters such as USD")]
    InvalidCurrency(String),

    #[error("invalid time {hour:02}:{minute:02}")]
    InvalidTime { hour: u32, minute: u32 },

    #[error("timezone must be set before choosing a notification time")]
    MissingTimezone,
}
