use crate::core::error::SourceError;
use std::future::Future;
use std::time::Duration;
use tracing::debug;

const USER_AGENT: &str = concat!("fxnotify/", env!("CARGO_PKG_VERSION"));

/// How many times to ask one source, how long to wait between attempts and
/// how long a single attempt may take.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: usize,
    pub base_delay: Duration,
    pub attempt_timeout: Duration,
}

impl RetryPolicy {
    /// Three attempts, 1s then 2s apart, each with a 10s timeout.
    pub const fn standard() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
            attempt_timeout: Duration::from_secs(10),
        }
    }

    /// One attempt with a 10s timeout.
    pub const fn single_attempt() -> Self {
        Self {
            max_attempts: 1,
            base_delay: Duration::ZERO,
            attempt_timeout: Duration::from_secs(10),
        }
    }

    /// No waiting between attempts.
    pub const fn immediate(max_attempts: usize) -> Self {
        Self {
            max_attempts,
            base_delay: Duration::ZERO,
            attempt_timeout: Duration::from_secs(10),
        }
    }

    /// Delay after the given failed attempt (1-based): base, 2*base, 4*base...
    pub fn backoff(&self, attempt: usize) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16) as u32;
        self.base_delay.saturating_mul(2u32.pow(exponent))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::standard()
    }
}

/// Retries an async operation according to `policy`.
///
/// Each attempt is bounded by `policy.attempt_timeout`; a timeout counts as a
/// transient failure. Non-retryable errors are returned immediately.
pub async fn with_retry<F, Fut, T>(mut operation: F, policy: &RetryPolicy) -> Result<T, SourceError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, SourceError>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1;
    loop {
        let outcome = match tokio::time::timeout(policy.attempt_timeout, operation()).await {
            Ok(result) => result,
            Err(_) => Err(SourceError::Transient(format!(
                "timed out after {}s",
                policy.attempt_timeout.as_secs_f64()
            ))),
        };

        match outcome {
            Ok(val) => return Ok(val),
            Err(err) if !err.is_retryable() => return Err(err),
            Err(err) => {
                if attempt >= max_attempts {
                    return Err(err);
                }
                let delay = policy.backoff(attempt);
                debug!(
                    "Attempt {}/{} failed: {}. Retrying in {:?}...",
                    attempt, max_attempts, err, delay
                );
                attempt += 1;
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}

/// HTTP client shared by the providers. Some upstreams reject requests
/// without a user agent.
pub fn http_client() -> reqwest::Client {
    reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .build()
        .unwrap_or_else(|_| reqwest::Client::new())
}

/// GETs `url` and returns the body, mapping HTTP and transport failures to
/// transient errors.
pub async fn get_text(client: &reqwest::Client, url: reqwest::Url) -> Result<String, SourceError> {
    debug!("Requesting {}", url);
    let response = client.get(url).send().await?.error_for_status()?;
    let body = response.text().await?;
    if body.trim().is_empty() {
        return Err(SourceError::Transient("received empty response".into()));
    }
    Ok(body)
}

/// Parses `base_url` joined with `path`, optionally adding query pairs.
pub fn build_url(base_url: &str, path: &str, query: &[(&str, &str)]) -> Result<reqwest::Url, SourceError> {
    let raw = format!("{}{}", base_url.trim_end_matches('/'), path);
    let parsed = if query.is_empty() {
        reqwest::Url::parse(&raw)
    } else {
        reqwest::Url::parse_with_params(&raw, query)
    };
    parsed.map_err(|e| SourceError::Transient(format!("invalid url {raw}: {e}")))
}
