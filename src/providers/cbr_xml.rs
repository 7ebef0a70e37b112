use super::util::{build_url, get_text, http_client};
use crate::core::clock::Clock;
use crate::core::error::SourceError;
use crate::core::rate::{RateSource, Recency, SourceQuote};
use async_trait::async_trait;
use chrono::{Duration, NaiveDate};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, instrument};

#[derive(Debug, Deserialize)]
struct ValCurs {
    #[serde(rename = "@Date")]
    date: String,
    #[serde(rename = "Valute", default)]
    valutes: Vec<XmlValute>,
}

#[derive(Debug, Deserialize)]
struct XmlValute {
    #[serde(rename = "CharCode")]
    char_code: String,
    #[serde(rename = "Nominal")]
    nominal: Option<String>,
    #[serde(rename = "Value")]
    value: String,
}

/// Secondary rate feed: the official daily XML document.
///
/// Numbers use a decimal comma and the document date is `DD.MM.YYYY`.
pub struct CbrXmlSource {
    base_url: String,
    recency: Recency,
    client: reqwest::Client,
    clock: Arc<dyn Clock>,
}

impl CbrXmlSource {
    pub fn new(base_url: &str, recency: Recency, clock: Arc<dyn Clock>) -> Self {
        Self {
            base_url: base_url.to_string(),
            recency,
            client: http_client(),
            clock,
        }
    }

    fn url(&self) -> Result<reqwest::Url, SourceError> {
        match self.recency {
            Recency::Fresh => build_url(&self.base_url, "/scripts/XML_daily.asp", &[]),
            Recency::Stale => {
                let previous_day = self.clock.now().date_naive() - Duration::days(1);
                let date_req = previous_day.format("%d/%m/%Y").to_string();
                build_url(
                    &self.base_url,
                    "/scripts/XML_daily.asp",
                    &[("date_req", date_req.as_str())],
                )
            }
        }
    }
}

fn parse_decimal_comma(raw: &str) -> Result<Decimal, SourceError> {
    let normalized = raw.trim().replace(',', ".");
    Decimal::from_str(&normalized)
        .map_err(|e| SourceError::Transient(format!("invalid number '{raw}': {e}")))
}

/// Extracts the quote for `currency_code` from a daily XML document.
fn parse_daily_xml(body: &str, currency_code: &str) -> Result<SourceQuote, SourceError> {
    let document: ValCurs = quick_xml::de::from_str(body)
        .map_err(|e| SourceError::Transient(format!("malformed rate payload: {e}")))?;

    let as_of_date = NaiveDate::parse_from_str(document.date.trim(), "%d.%m.%Y").map_err(|e| {
        SourceError::Transient(format!("invalid Date attribute '{}': {e}", document.date))
    })?;

    let valute = document
        .valutes
        .iter()
        .find(|v| v.char_code.trim().eq_ignore_ascii_case(currency_code))
        .ok_or_else(|| SourceError::NotFound(format!("{currency_code} is not in the payload")))?;

    let nominal = match valute.nominal.as_deref().map(str::trim) {
        Some(raw) if !raw.is_empty() => Some(raw.parse::<u32>().map_err(|e| {
            SourceError::Transient(format!("invalid Nominal '{raw}': {e}"))
        })?),
        _ => None,
    };

    Ok(SourceQuote {
        value: parse_decimal_comma(&valute.value)?,
        nominal,
        as_of_date,
    })
}

#[async_trait]
impl RateSource for CbrXmlSource {
    fn name(&self) -> &str {
        match self.recency {
            Recency::Fresh => "cbr-xml",
            Recency::Stale => "cbr-xml-archive",
        }
    }

    fn recency(&self) -> Recency {
        self.recency
    }

    #[instrument(name = "CbrXmlFetch", skip(self), fields(source = %self.name()))]
    async fn fetch_quote(&self, currency_code: &str) -> Result<SourceQuote, SourceError> {
        let url = self.url()?;
        let body = get_text(&self.client, url).await?;
        let quote = parse_daily_xml(&body, currency_code)?;
        debug!(
            "Fetched {} = {} per {:?} as of {}",
            currency_code, quote.value, quote.nominal, quote.as_of_date
        );
        Ok(quote)
    }
}
