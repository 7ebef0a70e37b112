//! Currency rate abstractions and core types

use crate::core::error::{RateError, SourceError};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt::Display;

/// Whether a source publishes today's observation or an archived one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Recency {
    Fresh,
    Stale,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Trend {
    Up,
    Down,
    Flat,
}

impl Trend {
    /// Direction from the previously cached rate to the current one.
    pub fn between(previous: Option<Decimal>, current: Decimal) -> Self {
        match previous.map(|prev| current.cmp(&prev)) {
            Some(Ordering::Greater) => Trend::Up,
            Some(Ordering::Less) => Trend::Down,
            Some(Ordering::Equal) | None => Trend::Flat,
        }
    }

    pub fn arrow(&self) -> &'static str {
        match self {
            Trend::Up => "▲",
            Trend::Down => "▼",
            Trend::Flat => "=",
        }
    }
}

impl Display for Trend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            match self {
                Trend::Up => "up",
                Trend::Down => "down",
                Trend::Flat => "flat",
            }
        )
    }
}

/// Last observed rate for a currency, kept for trend comparison.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateRecord {
    pub currency_code: String,
    pub rate: Decimal,
    pub as_of_date: NaiveDate,
    pub observed_at: DateTime<Utc>,
}

/// A raw quote as published by a source, before lot-size normalisation.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceQuote {
    pub value: Decimal,
    pub nominal: Option<u32>,
    pub as_of_date: NaiveDate,
}

impl SourceQuote {
    pub fn normalized_rate(&self) -> Decimal {
        normalize_rate(self.value, self.nominal)
    }
}

/// Rate per single unit of currency. A missing or zero nominal counts as 1.
pub fn normalize_rate(value: Decimal, nominal: Option<u32>) -> Decimal {
    match nominal {
        Some(n) if n > 1 => value / Decimal::from(n),
        _ => value,
    }
}

/// Outcome of a successful acquisition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateQuote {
    pub currency_code: String,
    pub rate: Decimal,
    pub as_of_date: NaiveDate,
    pub stale: bool,
    pub trend: Trend,
    pub source: String,
}

/// One link in the acquisition chain.
#[async_trait]
pub trait RateSource: Send + Sync {
    fn name(&self) -> &str;
    fn recency(&self) -> Recency;
    async fn fetch_quote(&self, currency_code: &str) -> Result<SourceQuote, SourceError>;
}

#[async_trait]
pub trait RateProvider: Send + Sync {
    async fn fetch(&self, currency_code: &str) -> Result<RateQuote, RateError>;
}
