//! Catalog API client
//!
//! Authenticated GET requests with failure classification and retry:
//! - 429: exponential backoff, `base × 2^(attempt+1)`; unbounded unless the
//!   policy caps it
//! - 401/403: no retry, reported as [`FetchOutcome::Inaccessible`]
//! - ≥500: bounded retries with linear backoff, `base × (attempt+1)`
//! - anything else: returned to the caller immediately

use reqwest::header::CONTENT_TYPE;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use std::time::Duration;
use thiserror::Error;

const USER_AGENT: &str = concat!("skilltree-sync/", env!("CARGO_PKG_VERSION"));

/// Backoff unit for 429 and 5xx retries
pub const DEFAULT_BASE_DELAY: Duration = Duration::from_millis(2000);

/// Catalog client errors
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Rate limit still exceeded after {0} retries")]
    RateLimitExhausted(u32),

    #[error("Server error {status} after {retries} retries")]
    ServerError { status: u16, retries: u32 },

    #[error("API error {0}: {1}")]
    ApiError(u16, String),

    #[error("Parse error: {0}")]
    ParseError(String),
}

/// What to do with a non-success response
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// 429: wait and retry
    RateLimited(Duration),
    /// 5xx: wait and retry
    ServerError(Duration),
    /// 401/403: the credential cannot see this resource
    Skip,
    /// Give up and report the failure
    Fail,
}

/// Retry limits and timeouts for one client
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub base_delay: Duration,
    /// `None` retries 429 forever
    pub max_rate_limit_retries: Option<u32>,
    pub max_server_retries: u32,
    pub timeout: Duration,
}

impl RetryPolicy {
    /// Full-catalog runs favour eventual completion: 429 is retried forever
    pub fn full_sync() -> Self {
        Self {
            base_delay: DEFAULT_BASE_DELAY,
            max_rate_limit_retries: None,
            max_server_retries: 3,
            timeout: Duration::from_secs(30),
        }
    }

    /// Batch runs favour failing fast so the operator can re-run the batch
    pub fn batch() -> Self {
        Self {
            base_delay: DEFAULT_BASE_DELAY,
            max_rate_limit_retries: Some(3),
            max_server_retries: 3,
            timeout: Duration::from_secs(15),
        }
    }

    pub fn with_base_delay(mut self, base_delay: Duration) -> Self {
        self.base_delay = base_delay;
        self
    }

    /// Delay before retry number `attempt` (0-based) after a 429
    pub fn rate_limit_delay(&self, attempt: u32) -> Duration {
        self.base_delay
            .saturating_mul(2u32.saturating_pow(attempt.saturating_add(1)))
    }

    /// Delay before retry number `attempt` (0-based) after a 5xx
    pub fn server_error_delay(&self, attempt: u32) -> Duration {
        self.base_delay.saturating_mul(attempt.saturating_add(1))
    }

    /// Classify a non-success status given the retries already spent
    pub fn decide(
        &self,
        status: StatusCode,
        rate_limit_attempts: u32,
        server_attempts: u32,
    ) -> RetryDecision {
        match status {
            StatusCode::TOO_MANY_REQUESTS => match self.max_rate_limit_retries {
                Some(max) if rate_limit_attempts >= max => RetryDecision::Fail,
                _ => RetryDecision::RateLimited(self.rate_limit_delay(rate_limit_attempts)),
            },
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => RetryDecision::Skip,
            s if s.is_server_error() && server_attempts < self.max_server_retries => {
                RetryDecision::ServerError(self.server_error_delay(server_attempts))
            }
            _ => RetryDecision::Fail,
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::full_sync()
    }
}

/// Successful fetch result
#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome<T> {
    Body(T),
    /// 401/403: skip this resource, not an error
    Inaccessible,
}

/// Catalog API client
///
/// Strictly sequential: callers await each request before issuing the next.
pub struct CatalogClient {
    http_client: reqwest::Client,
    base_url: String,
    token: String,
    policy: RetryPolicy,
}

impl CatalogClient {
    pub fn new(base_url: &str, token: &str, policy: RetryPolicy) -> Result<Self, CatalogError> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(policy.timeout)
            .build()
            .map_err(|e| CatalogError::NetworkError(e.to_string()))?;

        Ok(Self {
            http_client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.to_string(),
            policy,
        })
    }

    /// Absolute URL for an API path such as `/machine/tags/42`
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// GET `url` and decode the JSON body, retrying per the policy
    pub async fn fetch_json<T: DeserializeOwned>(
        &self,
        url: &str,
    ) -> Result<FetchOutcome<T>, CatalogError> {
        let mut rate_limit_attempts = 0u32;
        let mut server_attempts = 0u32;

        loop {
            tracing::debug!(url = %url, "Querying catalog API");

            let response = self
                .http_client
                .get(url)
                .bearer_auth(&self.token)
                .header(CONTENT_TYPE, "application/json")
                .send()
                .await
                .map_err(|e| CatalogError::NetworkError(e.to_string()))?;

            let status = response.status();
            if status.is_success() {
                let body = response
                    .json::<T>()
                    .await
                    .map_err(|e| CatalogError::ParseError(e.to_string()))?;
                return Ok(FetchOutcome::Body(body));
            }

            match self.policy.decide(status, rate_limit_attempts, server_attempts) {
                RetryDecision::RateLimited(delay) => {
                    rate_limit_attempts += 1;
                    tracing::warn!(
                        url = %url,
                        attempt = rate_limit_attempts,
                        delay_secs = delay.as_secs_f64(),
                        "Rate limited, retrying after backoff"
                    );
                    tokio::time::sleep(delay).await;
                }
                RetryDecision::ServerError(delay) => {
                    server_attempts += 1;
                    tracing::warn!(
                        url = %url,
                        status = status.as_u16(),
                        attempt = server_attempts,
                        delay_secs = delay.as_secs_f64(),
                        "Server error, retrying after backoff"
                    );
                    tokio::time::sleep(delay).await;
                }
                RetryDecision::Skip => {
                    tracing::warn!(
                        url = %url,
                        status = status.as_u16(),
                        "Access denied, skipping"
                    );
                    return Ok(FetchOutcome::Inaccessible);
                }
                RetryDecision::Fail => {
                    return Err(match status {
                        StatusCode::TOO_MANY_REQUESTS => {
                            CatalogError::RateLimitExhausted(rate_limit_attempts)
                        }
                        s if s.is_server_error() => CatalogError::ServerError {
                            status: s.as_u16(),
                            retries: server_attempts,
                        },
                        s => {
                            let body = response.text().await.unwrap_or_default();
                            CatalogError::ApiError(s.as_u16(), body)
                        }
                    });
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_limit_backoff_doubles() {
        let policy = RetryPolicy::full_sync();

        let delays: Vec<Duration> = (0..5).map(|n| policy.rate_limit_delay(n)).collect();
        assert_eq!(
            delays,
            vec![
                Duration::from_secs(4),
                Duration::from_secs(8),
                Duration::from_secs(16),
                Duration::from_secs(32),
                Duration::from_secs(64),
            ]
        );
        assert!(delays.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_repeated_429_decisions_strictly_increase() {
        let policy = RetryPolicy::full_sync();

        let mut previous = Duration::ZERO;
        for attempt in 0..20 {
            match policy.decide(StatusCode::TOO_MANY_REQUESTS, attempt, 0) {
                RetryDecision::RateLimited(delay) => {
                    assert_eq!(delay, DEFAULT_BASE_DELAY * 2u32.pow(attempt + 1));
                    assert!(delay > previous);
                    previous = delay;
                }
                other => panic!("full sync must keep retrying 429, got {:?}", other),
            }
        }
    }

    #[test]
    fn test_backoff_saturates_instead_of_overflowing() {
        let policy = RetryPolicy::full_sync();
        assert!(policy.rate_limit_delay(u32::MAX) >= policy.rate_limit_delay(40));
    }

    #[test]
    fn test_batch_policy_caps_rate_limit_retries() {
        let policy = RetryPolicy::batch();

        assert!(matches!(
            policy.decide(StatusCode::TOO_MANY_REQUESTS, 2, 0),
            RetryDecision::RateLimited(_)
        ));
        assert_eq!(
            policy.decide(StatusCode::TOO_MANY_REQUESTS, 3, 0),
            RetryDecision::Fail
        );
        assert_eq!(policy.timeout, Duration::from_secs(15));
    }

    #[test]
    fn test_access_denied_is_skip() {
        let policy = RetryPolicy::full_sync();
        assert_eq!(policy.decide(StatusCode::FORBIDDEN, 0, 0), RetryDecision::Skip);
        assert_eq!(policy.decide(StatusCode::UNAUTHORIZED, 0, 0), RetryDecision::Skip);
    }

    #[test]
    fn test_server_errors_linear_and_bounded() {
        let policy = RetryPolicy::full_sync();

        assert_eq!(
            policy.decide(StatusCode::INTERNAL_SERVER_ERROR, 0, 0),
            RetryDecision::ServerError(Duration::from_secs(2))
        );
        assert_eq!(
            policy.decide(StatusCode::BAD_GATEWAY, 0, 1),
            RetryDecision::ServerError(Duration::from_secs(4))
        );
        assert_eq!(
            policy.decide(StatusCode::SERVICE_UNAVAILABLE, 0, 2),
            RetryDecision::ServerError(Duration::from_secs(6))
        );
        assert_eq!(
            policy.decide(StatusCode::INTERNAL_SERVER_ERROR, 0, 3),
            RetryDecision::Fail
        );
    }

    #[test]
    fn test_other_client_errors_fail_immediately() {
        let policy = RetryPolicy::full_sync();
        assert_eq!(policy.decide(StatusCode::NOT_FOUND, 0, 0), RetryDecision::Fail);
        assert_eq!(policy.decide(StatusCode::BAD_REQUEST, 0, 0), RetryDecision::Fail);
    }

    #[test]
    fn test_url_joins_base_and_path() {
        let client = CatalogClient::new(
            "https://labs.hackthebox.com/api/v4/",
            "token",
            RetryPolicy::default(),
        )
        .unwrap();
        assert_eq!(
            client.url("/machine/tags/1"),
            "https://labs.hackthebox.com/api/v4/machine/tags/1"
        );
    }
}
