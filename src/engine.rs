//! Rate acquisition through an ordered chain of sources.

use crate::core::clock::Clock;
use crate::core::config::AppConfig;
use crate::core::error::RateError;
use crate::core::rate::{RateProvider, RateQuote, RateRecord, RateSource, Recency, Trend};
use crate::core::storage::Storage;
use crate::providers::cbr_json::CbrJsonSource;
use crate::providers::cbr_xml::CbrXmlSource;
use crate::providers::util::{RetryPolicy, with_retry};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Tries each source in order and stops at the first one that yields a rate.
///
/// Sources are queried strictly one after another; the retry policy applies
/// to each source separately. A successful fetch is compared against the
/// cached record for the currency to derive the trend and then replaces it.
pub struct RateEngine {
    sources: Vec<Arc<dyn RateSource>>,
    storage: Arc<dyn Storage>,
    policy: RetryPolicy,
    clock: Arc<dyn Clock>,
}

impl RateEngine {
    pub fn new(
        sources: Vec<Arc<dyn RateSource>>,
        storage: Arc<dyn Storage>,
        policy: RetryPolicy,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            sources,
            storage,
            policy,
            clock,
        }
    }

    /// Primary feed today, primary archive, secondary today, secondary archive.
    pub fn from_config(config: &AppConfig, storage: Arc<dyn Storage>, clock: Arc<dyn Clock>) -> Self {
        let json_url = &config.providers.cbr_json.base_url;
        let xml_url = &config.providers.cbr_xml.base_url;
        let sources: Vec<Arc<dyn RateSource>> = vec![
            Arc::new(CbrJsonSource::new(json_url, Recency::Fresh, Arc::clone(&clock))),
            Arc::new(CbrJsonSource::new(json_url, Recency::Stale, Arc::clone(&clock))),
            Arc::new(CbrXmlSource::new(xml_url, Recency::Fresh, Arc::clone(&clock))),
            Arc::new(CbrXmlSource::new(xml_url, Recency::Stale, Arc::clone(&clock))),
        ];
        Self::new(sources, storage, RetryPolicy::standard(), clock)
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    async fn previous_rate(&self, currency_code: &str) -> Option<RateRecord> {
        match self.storage.get_cached_rate(currency_code).await {
            Ok(record) => record,
            Err(e) => {
                warn!(currency = %currency_code, error = %e, "Failed to read cached rate, trend will be flat");
                None
            }
        }
    }
}

#[async_trait]
impl RateProvider for RateEngine {
    #[instrument(name = "RateFetch", skip(self))]
    async fn fetch(&self, currency_code: &str) -> Result<RateQuote, RateError> {
        let code = currency_code.trim().to_ascii_uppercase();
        let mut failures = Vec::new();

        for source in &self.sources {
            let outcome = with_retry(|| source.fetch_quote(&code), &self.policy).await;
            let quote = match outcome {
                Ok(quote) => quote,
                Err(e) => {
                    warn!(source = %source.name(), currency = %code, error = %e, "Rate source exhausted");
                    failures.push(format!("{}: {}", source.name(), e));
                    continue;
                }
            };

            let rate = quote.normalized_rate();
            let stale = source.recency() == Recency::Stale;

            // Trend must be read before the new record replaces the old one.
            let previous = self.previous_rate(&code).await;
            let trend = Trend::between(previous.map(|r| r.rate), rate);

            let record = RateRecord {
                currency_code: code.clone(),
                rate,
                as_of_date: quote.as_of_date,
                observed_at: self.clock.now(),
            };
            if let Err(e) = self.storage.save_rate(&record).await {
                warn!(currency = %code, error = %e, "Failed to cache rate");
            }

            info!(
                source = %source.name(),
                currency = %code,
                %rate,
                stale,
                %trend,
                "Acquired rate"
            );
            return Ok(RateQuote {
                currency_code: code,
                rate,
                as_of_date: quote.as_of_date,
                stale,
                trend,
                source: source.name().to_string(),
            });
        }

        debug!("All {} sources failed for {}", self.sources.len(), code);
        Err(RateError::AcquisitionFailed {
            currency: code,
            reasons: failures.join("; "),
        })
    }
}
