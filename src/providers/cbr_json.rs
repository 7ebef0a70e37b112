use super::util::{build_url, get_text, http_client};
use crate::core::clock::Clock;
use crate::core::error::SourceError;
use crate::core::rate::{RateSource, Recency, SourceQuote};
use async_trait::async_trait;
use chrono::{Duration, NaiveDate};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, instrument};

#[derive(Debug, Deserialize)]
struct DailyJsonResponse {
    #[serde(rename = "Date")]
    date: Option<String>,
    #[serde(rename = "Valute", default)]
    valute: HashMap<String, JsonValute>,
}

#[derive(Debug, Deserialize)]
struct JsonValute {
    #[serde(rename = "Value")]
    value: Decimal,
    #[serde(rename = "Nominal", default)]
    nominal: Option<u32>,
}

/// Primary rate feed: a daily JSON document keyed by currency code.
///
/// `Recency::Fresh` reads today's document, `Recency::Stale` reads the
/// archived document for the previous day.
pub struct CbrJsonSource {
    base_url: String,
    recency: Recency,
    client: reqwest::Client,
    clock: Arc<dyn Clock>,
}

impl CbrJsonSource {
    pub fn new(base_url: &str, recency: Recency, clock: Arc<dyn Clock>) -> Self {
        Self {
            base_url: base_url.to_string(),
            recency,
            client: http_client(),
            clock,
        }
    }

    fn path(&self) -> String {
        match self.recency {
            Recency::Fresh => "/daily_json.js".to_string(),
            Recency::Stale => {
                let previous_day = self.clock.now().date_naive() - Duration::days(1);
                format!("/archive/{}/daily_json.js", previous_day.format("%Y/%m/%d"))
            }
        }
    }
}

/// Extracts the quote for `currency_code` from a daily JSON document.
fn parse_daily_json(body: &str, currency_code: &str) -> Result<SourceQuote, SourceError> {
    let response: DailyJsonResponse = serde_json::from_str(body)
        .map_err(|e| SourceError::Transient(format!("malformed rate payload: {e}")))?;

    // e.g. 2025-12-06T11:30:00+03:00, only the calendar date matters
    let as_of_date = response
        .date
        .as_deref()
        .and_then(|raw| raw.split('T').next())
        .and_then(|date| NaiveDate::parse_from_str(date, "%Y-%m-%d").ok())
        .ok_or_else(|| {
            SourceError::Transient(format!("missing or invalid Date: {:?}", response.date))
        })?;

    let valute = response
        .valute
        .get(currency_code)
        .ok_or_else(|| SourceError::NotFound(format!("{currency_code} is not in the payload")))?;

    Ok(SourceQuote {
        value: valute.value,
        nominal: valute.nominal,
        as_of_date,
    })
}

#[async_trait]
impl RateSource for CbrJsonSource {
    fn name(&self) -> &str {
        match self.recency {
            Recency::Fresh => "cbr-json",
            Recency::Stale => "cbr-json-archive",
        }
    }

    fn recency(&self) -> Recency {
        self.recency
    }

    #[instrument(name = "CbrJsonFetch", skip(self), fields(source = %self.name()))]
    async fn fetch_quote(&self, currency_code: &str) -> Result<SourceQuote, SourceError> {
        let url = build_url(&self.base_url, &self.path(), &[])?;
        let body = get_text(&self.client, url).await?;
        let quote = parse_daily_json(&body, currency_code)?;
        debug!(
            "Fetched {} = {} per {:?} as of {}",
            currency_code, quote.value, quote.nominal, quote.as_of_date
        );
        Ok(quote)
    }
}
