//! Scripted collaborators for unit tests.

use crate::core::delivery::Delivery;
use crate::core::error::{RateError, SourceError};
use crate::core::geo::{Coordinates, Geocoder, TimezoneLookup};
use crate::core::rate::{RateProvider, RateQuote, RateSource, Recency, SourceQuote, Trend};
use crate::core::settings::UserId;
use anyhow::{Result, anyhow};
use async_trait::async_trait;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use tokio::sync::Notify;
use std::sync::{Arc, Mutex};
use std::sync::atomic::{AtomicUsize, Ordering};

pub fn as_of() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 12, 6).unwrap()
}

/// Fails transiently `failures` times, then returns `outcome` forever.
pub struct FakeRateSource {
    name: String,
    recency: Recency,
    failures: usize,
    outcome: Result<SourceQuote, SourceError>,
    pub calls: AtomicUsize,
}

impl FakeRateSource {
    pub fn new(name: &str, recency: Recency, failures: usize, outcome: Result<SourceQuote, SourceError>) -> Self {
        Self {
            name: name.to_string(),
            recency,
            failures,
            outcome,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn ok(name: &str, recency: Recency, value: Decimal, nominal: Option<u32>) -> Self {
        Self::new(
            name,
            recency,
            0,
            Ok(SourceQuote {
                value,
                nominal,
                as_of_date: as_of(),
            }),
        )
    }

    pub fn down(name: &str, recency: Recency) -> Self {
        Self::new(
            name,
            recency,
            usize::MAX,
            Err(SourceError::Transient("unreachable".into())),
        )
    }

    pub fn missing(name: &str, recency: Recency) -> Self {
        Self::new(
            name,
            recency,
            0,
            Err(SourceError::NotFound("currency absent".into())),
        )
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RateSource for FakeRateSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn recency(&self) -> Recency {
        self.recency
    }

    async fn fetch_quote(&self, _currency_code: &str) -> Result<SourceQuote, SourceError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        if n < self.failures {
            return Err(SourceError::Transient(format!("{} attempt {} failed", self.name, n + 1)));
        }
        self.outcome.clone()
    }
}

/// Records every currency it is asked for. A gated provider holds each
/// fetch until the gate is notified.
pub struct FakeRateProvider {
    outcome: Result<Decimal, ()>,
    gate: Option<Arc<Notify>>,
    pub requested: Mutex<Vec<String>>,
}

impl FakeRateProvider {
    pub fn ok(rate: Decimal) -> Self {
        Self {
            outcome: Ok(rate),
            gate: None,
            requested: Mutex::new(Vec::new()),
        }
    }

    pub fn failing() -> Self {
        Self {
            outcome: Err(()),
            gate: None,
            requested: Mutex::new(Vec::new()),
        }
    }

    pub fn gated(rate: Decimal, gate: Arc<Notify>) -> Self {
        Self {
            gate: Some(gate),
            ..Self::ok(rate)
        }
    }

    pub fn requested(&self) -> Vec<String> {
        self.requested.lock().unwrap().clone()
    }
}

#[async_trait]
impl RateProvider for FakeRateProvider {
    async fn fetch(&self, currency_code: &str) -> Result<RateQuote, RateError> {
        self.requested.lock().unwrap().push(currency_code.to_string());
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        match self.outcome {
            Ok(rate) => Ok(RateQuote {
                currency_code: currency_code.to_string(),
                rate,
                as_of_date: as_of(),
                stale: false,
                trend: Trend::Flat,
                source: "fake".into(),
            }),
            Err(()) => Err(RateError::AcquisitionFailed {
                currency: currency_code.to_string(),
                reasons: "all sources down".into(),
            }),
        }
    }
}

pub struct FakeGeocoder {
    name: String,
    outcome: Result<Coordinates, SourceError>,
    pub calls: AtomicUsize,
}

impl FakeGeocoder {
    pub fn ok(name: &str, latitude: f64, longitude: f64) -> Self {
        Self {
            name: name.to_string(),
            outcome: Ok(Coordinates {
                latitude,
                longitude,
            }),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing(name: &str, error: SourceError) -> Self {
        Self {
            name: name.to_string(),
            outcome: Err(error),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Geocoder for FakeGeocoder {
    fn name(&self) -> &str {
        &self.name
    }

    async fn geocode(&self, _query: &str) -> Result<Coordinates, SourceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.outcome.clone()
    }
}

pub struct FakeTimezone {
    outcome: Result<i32, SourceError>,
    pub calls: AtomicUsize,
}

impl FakeTimezone {
    pub fn ok(offset_minutes: i32) -> Self {
        Self {
            outcome: Ok(offset_minutes),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing() -> Self {
        Self {
            outcome: Err(SourceError::Transient("timezone service down".into())),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TimezoneLookup for FakeTimezone {
    async fn utc_offset_minutes(&self, _coordinates: Coordinates) -> Result<i32, SourceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.outcome.clone()
    }
}

/// Collects sent messages; optionally refuses them, for everyone or for
/// one user.
#[derive(Default)]
pub struct RecordingDelivery {
    pub fail: bool,
    pub fail_for: Option<UserId>,
    pub sent: Mutex<Vec<(UserId, String)>>,
}

impl RecordingDelivery {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn failing_for(user_id: UserId) -> Self {
        Self {
            fail_for: Some(user_id),
            ..Self::default()
        }
    }

    pub fn sent(&self) -> Vec<(UserId, String)> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Delivery for RecordingDelivery {
    async fn send_text(&self, user_id: UserId, text: &str) -> Result<()> {
        self.sent.lock().unwrap().push((user_id, text.to_string()));
        if self.fail || self.fail_for == Some(user_id) {
            return Err(anyhow!("chat not found"));
        }
        Ok(())
    }
}
