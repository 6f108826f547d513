// SPDX-FileCopyrightText: 2025 Glasshouse Labs
//
// SPDX-License-Identifier: Apache-2.0

//! Zora universal GraphQL API integration
//!
//! This module provides an implementation of the `ApiClient` trait for the
//! Zora indexer. A single fetch walks a bounded retry loop: every attempt is
//! gated through the local [`RequestBudget`], issued with a per-attempt
//! deadline, and classified on failure to decide whether and how long to back
//! off before trying again.

use std::sync::{Arc, LazyLock};

use api_client::{ApiClient, ApiError, HealthStatus, MintedArtwork};
use regex::Regex;
use reqwest::{Client, StatusCode, header};
use serde::Deserialize;
use serde_json::json;
use thiserror::Error;
use tokio::time::{Duration, timeout};
use tracing::{debug, error, info, warn};
use url::Url;

use crate::{
    address::WalletAddress,
    budget::RequestBudget,
    query::{GraphQlEnvelope, GraphQlRequest},
};

// Zora API constants
const DEFAULT_ZORA_ENDPOINT: &str = "https://api.zora.co/universal/graphql";
const DEFAULT_ZORA_TIMEOUT_SECONDS: u64 = 10;
const DEFAULT_ZORA_HEALTH_CHECK_TIMEOUT_SECONDS: u64 = 5;
const DEFAULT_ZORA_MAX_RETRIES: u32 = 3;
const DEFAULT_REQUESTS_PER_MINUTE: u32 = 30;
const DEFAULT_BACKOFF_BASE_MS: u64 = 1_000;

/// 429 bodies carry a human-readable hint like
/// `"Rate limited, try again after 2.5 seconds."` in their `detail` field.
static DETAIL_WAIT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"try again after (\d+(?:\.\d+)?) seconds").expect("static pattern is valid")
});

/// Configuration for the Zora API client
#[derive(Debug, Clone)]
pub struct ZoraConfig {
    /// GraphQL endpoint URL
    pub endpoint: String,
    /// Per-attempt request timeout in seconds
    pub timeout_seconds: u64,
    /// Health check timeout in seconds
    pub health_check_timeout_seconds: u64,
    /// Maximum number of retry attempts after the initial one
    pub max_retries: u32,
    /// Local request budget per 60 second window
    pub requests_per_minute: u32,
    /// Base backoff unit in milliseconds; an attempt waits `2^attempt * base`
    /// (doubled for 403 responses). The default matches production pacing;
    /// tests shrink it.
    pub backoff_base_ms: u64,
}

impl Default for ZoraConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ZORA_ENDPOINT.to_string(),
            timeout_seconds: DEFAULT_ZORA_TIMEOUT_SECONDS,
            health_check_timeout_seconds: DEFAULT_ZORA_HEALTH_CHECK_TIMEOUT_SECONDS,
            max_retries: DEFAULT_ZORA_MAX_RETRIES,
            requests_per_minute: DEFAULT_REQUESTS_PER_MINUTE,
            backoff_base_ms: DEFAULT_BACKOFF_BASE_MS,
        }
    }
}

/// Zora API client implementation
#[derive(Debug)]
pub struct ZoraClient {
    client: Client,
    config: ZoraConfig,
    budget: Arc<RequestBudget>,
}

/// Errors specific to the Zora API client
#[derive(Debug, Error)]
#[allow(missing_docs)]
pub enum ZoraError {
    /// HTTP request failed before a response arrived
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Response body did not parse as the expected envelope
    #[error("JSON parsing failed: {0}")]
    Json(#[from] serde_json::Error),

    /// Per-attempt deadline exceeded
    #[error("request timeout after {seconds}s")]
    Timeout { seconds: u64 },

    /// Upstream returned 429; `suggested_wait_ms` carries the server's hint
    /// (body `detail` takes precedence over the `Retry-After` header)
    #[error("rate limited by upstream")]
    RateLimited { suggested_wait_ms: Option<u64> },

    /// Upstream returned 403, treated as probable soft rate limiting
    #[error("forbidden by upstream (soft rate limit)")]
    Forbidden,

    /// Transient server fault (5xx)
    #[error("server error: {status} - {message}")]
    Server { status: u16, message: String },

    /// Any other error response; retrying would not help
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// Rejected before any network or budget work
    #[error("invalid wallet address: {0}")]
    InvalidAddress(String),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Terminal failure after the retry loop, wrapping the last observed cause
    #[error("failed to fetch first mint for {address}: {source}")]
    Fetch {
        address: String,
        #[source]
        source: Box<ZoraError>,
    },
}

impl ZoraError {
    /// How long to wait before retrying this failure, or `None` when the
    /// class is not retryable at all.
    ///
    /// 429 honors the server's wait hint when one was present; 403 backs off
    /// at double the base unit to reflect the higher uncertainty of a soft
    /// rate limit.
    fn retry_wait(&self, attempt: u32, base_ms: u64) -> Option<Duration> {
        let wait_ms = match self {
            ZoraError::RateLimited { suggested_wait_ms } => {
                suggested_wait_ms.unwrap_or_else(|| exponential_ms(attempt, base_ms))
            }
            ZoraError::Forbidden => exponential_ms(attempt, base_ms.saturating_mul(2)),
            ZoraError::Server { .. } | ZoraError::Timeout { .. } | ZoraError::Http(_) => {
                exponential_ms(attempt, base_ms)
            }
            _ => return None,
        };
        Some(Duration::from_millis(wait_ms))
    }
}

impl From<ZoraError> for ApiError {
    fn from(value: ZoraError) -> Self {
        match value {
            ZoraError::InvalidAddress(message) => ApiError::InvalidInput { message },
            ZoraError::Config(message) => ApiError::Configuration { message },
            ZoraError::Fetch { address, source } => {
                let message = source.to_string();
                match *source {
                    ZoraError::RateLimited { .. } => ApiError::RateLimitExceeded { address },
                    ZoraError::Forbidden => ApiError::Forbidden { address },
                    ZoraError::Http(_) | ZoraError::Timeout { .. } | ZoraError::Server { .. } => {
                        ApiError::TransientNetwork { address, message }
                    }
                    _ => ApiError::NonRetryableApi { address, message },
                }
            }
            // Errors that never went through the fetch loop, e.g. health
            // probe transport failures.
            other => ApiError::Custom {
                error: anyhow::Error::new(other),
            },
        }
    }
}

/// `2^attempt * base_ms`, saturating instead of overflowing
fn exponential_ms(attempt: u32, base_ms: u64) -> u64 {
    base_ms.saturating_mul(1u64 << attempt.min(20))
}

/// Extract the wait hint from a 429 response body's `detail` field, in
/// milliseconds. `"try again after 2.5 seconds"` yields exactly 2500.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn detail_wait_ms(body: &str) -> Option<u64> {
    #[derive(Debug, Deserialize)]
    struct RateLimitBody {
        detail: Option<String>,
    }

    let parsed: RateLimitBody = serde_json::from_str(body).ok()?;
    let detail = parsed.detail?;
    let captures = DETAIL_WAIT.captures(&detail)?;
    let seconds: f64 = captures.get(1)?.as_str().parse().ok()?;
    Some((seconds * 1000.0).round() as u64)
}

impl ZoraClient {
    /// Create a new Zora API client with its own request budget
    ///
    /// # Errors
    ///
    /// Returns an error if the endpoint is not a valid URL or the HTTP client
    /// cannot be created
    pub fn new(config: ZoraConfig) -> Result<Self, ZoraError> {
        let budget = Arc::new(RequestBudget::per_minute(config.requests_per_minute));
        Self::with_budget(config, budget)
    }

    /// Create a new Zora API client sharing an existing request budget
    ///
    /// Several clients handed the same `Arc<RequestBudget>` draw from one
    /// quota, which keeps the process-wide ceiling intact when the service
    /// layer constructs a client per worker.
    ///
    /// # Errors
    ///
    /// Returns an error if the endpoint is not a valid URL or the HTTP client
    /// cannot be created
    pub fn with_budget(config: ZoraConfig, budget: Arc<RequestBudget>) -> Result<Self, ZoraError> {
        Url::parse(&config.endpoint)
            .map_err(|e| ZoraError::Config(format!("invalid endpoint URL: {e}")))?;

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .user_agent("first-mint-api/0.1.0")
            .build()
            .map_err(ZoraError::Http)?;

        Ok(Self {
            client,
            config,
            budget,
        })
    }

    /// Fetch the first collected item's preview media URI for a wallet
    ///
    /// Drives the full retry loop. Returns `Ok(None)` when the wallet has no
    /// collected media; that is a successful outcome and is never retried.
    ///
    /// # Errors
    ///
    /// Returns an error on invalid input, on a non-retryable upstream
    /// response, or once a retryable failure class has spent all
    /// `max_retries + 1` attempts. The terminal error wraps the last observed
    /// cause together with the target address.
    pub async fn first_collected_artwork(
        &self,
        address: &str,
    ) -> Result<Option<MintedArtwork>, ZoraError> {
        let address = WalletAddress::new(address).map_err(ZoraError::InvalidAddress)?;

        let mut attempt: u32 = 0;
        let last_error = loop {
            self.acquire_slot().await;

            let error = match self.execute_query(&address).await {
                Ok(result) => return Ok(result),
                Err(error) => error,
            };

            match error.retry_wait(attempt, self.config.backoff_base_ms) {
                Some(wait) if attempt < self.config.max_retries => {
                    warn!(
                        address = %address,
                        attempt,
                        ?wait,
                        error = %error,
                        "attempt failed, backing off before retry"
                    );
                    tokio::time::sleep(wait).await;
                    attempt += 1;
                }
                // Retryable class out of attempts, or terminal class
                _ => break error,
            }
        };

        Err(ZoraError::Fetch {
            address: address.to_string(),
            source: Box::new(last_error),
        })
    }

    /// Gate one outbound attempt through the local request budget
    ///
    /// When the budget is spent, suspends until the window rolls over and
    /// re-checks exactly once; the window has elapsed by then, so a loop is
    /// unnecessary.
    async fn acquire_slot(&self) {
        if self.budget.try_acquire() {
            return;
        }
        let wait = self.budget.time_until_reset();
        warn!(?wait, "local request budget exhausted, waiting for window reset");
        tokio::time::sleep(wait).await;
        self.budget.try_acquire();
    }

    /// Issue one GraphQL attempt and classify the outcome
    async fn execute_query(
        &self,
        address: &WalletAddress,
    ) -> Result<Option<MintedArtwork>, ZoraError> {
        let payload = GraphQlRequest::first_collected(address);

        debug!(address = %address, "querying indexer for first collected token");

        let request = self
            .client
            .post(&self.config.endpoint)
            .json(&payload);

        let response = timeout(
            Duration::from_secs(self.config.timeout_seconds),
            request.send(),
        )
        .await
        .map_err(|_| ZoraError::Timeout {
            seconds: self.config.timeout_seconds,
        })?
        .map_err(ZoraError::Http)?;

        let status = response.status();
        match status {
            status if status.is_success() => {
                let body = response.text().await.map_err(ZoraError::Http)?;
                let envelope: GraphQlEnvelope =
                    serde_json::from_str(&body).map_err(ZoraError::Json)?;
                match envelope.first_downloadable_uri() {
                    Some(uri) => Ok(Some(MintedArtwork::new(uri, address.as_str()))),
                    None => {
                        debug!(address = %address, "no collected media found");
                        Ok(None)
                    }
                }
            }
            StatusCode::TOO_MANY_REQUESTS => {
                let header_wait_ms = response
                    .headers()
                    .get(header::RETRY_AFTER)
                    .and_then(|value| value.to_str().ok())
                    .and_then(|value| value.trim().parse::<u64>().ok())
                    .map(|seconds| seconds.saturating_mul(1000));
                let body = response.text().await.unwrap_or_default();
                let suggested_wait_ms = detail_wait_ms(&body).or(header_wait_ms);
                warn!(address = %address, ?suggested_wait_ms, "Zora API rate limited the request");
                Err(ZoraError::RateLimited { suggested_wait_ms })
            }
            StatusCode::FORBIDDEN => {
                warn!(address = %address, "Zora API returned 403, treating as soft rate limit");
                Err(ZoraError::Forbidden)
            }
            status if status.is_server_error() => {
                let message = response
                    .text()
                    .await
                    .unwrap_or_else(|_| "Unknown error".to_string());
                warn!("Zora API server error: {} - {}", status.as_u16(), message);
                Err(ZoraError::Server {
                    status: status.as_u16(),
                    message,
                })
            }
            status => {
                let message = response
                    .text()
                    .await
                    .unwrap_or_else(|_| "Unknown error".to_string());
                warn!("Zora API error: {} - {}", status.as_u16(), message);
                Err(ZoraError::Api {
                    status: status.as_u16(),
                    message,
                })
            }
        }
    }
}

impl ApiClient for ZoraClient {
    async fn health_check(&self) -> Result<HealthStatus, ApiError> {
        let probe = json!({ "query": "query { __typename }" });

        debug!("performing health check on Zora API");

        let request = self
            .client
            .post(&self.config.endpoint)
            .json(&probe)
            .header(header::CONTENT_TYPE, "application/json");

        let start_time = std::time::Instant::now();
        let response = timeout(
            Duration::from_secs(self.config.health_check_timeout_seconds),
            request.send(),
        )
        .await
        .map_err(|_| ZoraError::Timeout {
            seconds: self.config.health_check_timeout_seconds,
        })?
        .map_err(ZoraError::Http)?;

        let response_time = start_time.elapsed();

        match response.status() {
            status if status.is_success() => {
                info!("Zora API health check passed in {:?}", response_time);
                Ok(HealthStatus::Up)
            }
            StatusCode::TOO_MANY_REQUESTS => {
                warn!("Zora API health check failed: rate limited");
                Ok(HealthStatus::Degraded {
                    reason: "Rate limited".to_string(),
                })
            }
            StatusCode::FORBIDDEN => {
                warn!("Zora API health check failed: forbidden");
                Ok(HealthStatus::Degraded {
                    reason: "Forbidden".to_string(),
                })
            }
            status => {
                warn!("Zora API health check failed with status: {}", status);
                Ok(HealthStatus::Degraded {
                    reason: format!("API returned status {}", status.as_u16()),
                })
            }
        }
    }

    async fn fetch_first_minted_artwork(
        &self,
        address: &str,
    ) -> Result<Option<MintedArtwork>, ApiError> {
        info!(address, "fetching first minted artwork");
        match self.first_collected_artwork(address).await {
            Ok(result) => Ok(result),
            Err(e) => {
                error!(address, error = %e, "failed to fetch first minted artwork");
                Err(e.into())
            }
        }
    }

    fn name(&self) -> &'static str {
        "zora"
    }
}

#[cfg(test)]
mod tests {
    use wiremock::{
        Mock, MockServer, ResponseTemplate,
        matchers::{header, method},
    };

    use super::*;

    fn test_config(endpoint: String) -> ZoraConfig {
        ZoraConfig {
            endpoint,
            timeout_seconds: 1,
            backoff_base_ms: 1,
            ..Default::default()
        }
    }

    #[test]
    fn client_creation_invalid_endpoint() {
        let config = ZoraConfig {
            endpoint: "not a url".to_string(),
            ..Default::default()
        };
        let result = ZoraClient::new(config);
        assert!(result.is_err());
        match result.unwrap_err() {
            ZoraError::Config(message) => assert!(message.contains("invalid endpoint URL")),
            other => panic!("Expected Config error, got: {other:?}"),
        }
    }

    #[tokio::test]
    async fn client_creation_success() {
        let client = ZoraClient::new(ZoraConfig::default());
        assert!(client.is_ok());
        assert_eq!(client.unwrap().name(), "zora");
    }

    #[test]
    fn detail_wait_parses_fractional_seconds() {
        let body = r#"{"detail": "Rate limited, try again after 2.5 seconds."}"#;
        assert_eq!(detail_wait_ms(body), Some(2500));
    }

    #[test]
    fn detail_wait_parses_whole_seconds() {
        let body = r#"{"detail": "try again after 5 seconds"}"#;
        assert_eq!(detail_wait_ms(body), Some(5000));
    }

    #[test]
    fn detail_wait_rejects_unrelated_bodies() {
        assert_eq!(detail_wait_ms(r#"{"detail": "slow down"}"#), None);
        assert_eq!(detail_wait_ms(r#"{"message": "nope"}"#), None);
        assert_eq!(detail_wait_ms("not json"), None);
        assert_eq!(detail_wait_ms(""), None);
    }

    #[test]
    fn rate_limited_wait_prefers_server_hint() {
        let error = ZoraError::RateLimited {
            suggested_wait_ms: Some(2500),
        };
        // The hint wins on every attempt, not just the first
        assert_eq!(error.retry_wait(0, 1000), Some(Duration::from_millis(2500)));
        assert_eq!(error.retry_wait(3, 1000), Some(Duration::from_millis(2500)));
    }

    #[test]
    fn rate_limited_wait_falls_back_to_exponential() {
        let error = ZoraError::RateLimited {
            suggested_wait_ms: None,
        };
        assert_eq!(error.retry_wait(0, 1000), Some(Duration::from_millis(1000)));
        assert_eq!(error.retry_wait(2, 1000), Some(Duration::from_millis(4000)));
    }

    #[test]
    fn forbidden_wait_doubles_the_base() {
        let error = ZoraError::Forbidden;
        assert_eq!(error.retry_wait(0, 1000), Some(Duration::from_millis(2000)));
        assert_eq!(error.retry_wait(1, 1000), Some(Duration::from_millis(4000)));
    }

    #[test]
    fn transient_classes_use_the_plain_base() {
        let server = ZoraError::Server {
            status: 503,
            message: "unavailable".to_string(),
        };
        assert_eq!(
            server.retry_wait(1, 1000),
            Some(Duration::from_millis(2000))
        );

        let timed_out = ZoraError::Timeout { seconds: 10 };
        assert_eq!(
            timed_out.retry_wait(3, 1000),
            Some(Duration::from_millis(8000))
        );
    }

    #[test]
    fn non_retryable_classes_have_no_wait() {
        let api = ZoraError::Api {
            status: 400,
            message: "bad request".to_string(),
        };
        assert_eq!(api.retry_wait(0, 1000), None);

        let invalid = ZoraError::InvalidAddress("empty".to_string());
        assert_eq!(invalid.retry_wait(0, 1000), None);
    }

    #[test]
    fn exponential_backoff_saturates() {
        assert_eq!(exponential_ms(0, 1000), 1000);
        assert_eq!(exponential_ms(3, 1000), 8000);
        // Absurd attempt counts clamp instead of overflowing
        assert!(exponential_ms(64, u64::MAX / 2) > 0);
    }

    #[test]
    fn fetch_error_conversion_discriminates_classes() {
        let wrap = |source: ZoraError| ZoraError::Fetch {
            address: "vitalik.eth".to_string(),
            source: Box::new(source),
        };

        let api_error: ApiError = wrap(ZoraError::RateLimited {
            suggested_wait_ms: None,
        })
        .into();
        assert!(matches!(api_error, ApiError::RateLimitExceeded { .. }));

        let api_error: ApiError = wrap(ZoraError::Forbidden).into();
        assert!(matches!(api_error, ApiError::Forbidden { .. }));

        let api_error: ApiError = wrap(ZoraError::Server {
            status: 502,
            message: "bad gateway".to_string(),
        })
        .into();
        match api_error {
            ApiError::TransientNetwork { address, message } => {
                assert_eq!(address, "vitalik.eth");
                assert!(message.contains("502"));
            }
            other => panic!("Expected TransientNetwork, got: {other:?}"),
        }

        let api_error: ApiError = wrap(ZoraError::Api {
            status: 400,
            message: "bad query".to_string(),
        })
        .into();
        assert!(matches!(api_error, ApiError::NonRetryableApi { .. }));

        let api_error: ApiError = ZoraError::InvalidAddress("empty".to_string()).into();
        assert!(matches!(api_error, ApiError::InvalidInput { .. }));
    }

    #[tokio::test]
    async fn detail_hint_takes_precedence_over_retry_after_header() {
        let mock_server = MockServer::start().await;
        let client = ZoraClient::new(test_config(mock_server.uri())).unwrap();

        Mock::given(method("POST"))
            .and(header("Content-Type", "application/json"))
            .respond_with(
                ResponseTemplate::new(429)
                    .insert_header("retry-after", "5")
                    .set_body_json(json!({
                        "detail": "Rate limited, try again after 2.5 seconds."
                    })),
            )
            .mount(&mock_server)
            .await;

        let address = WalletAddress::new("vitalik.eth").unwrap();
        let result = client.execute_query(&address).await;
        match result.unwrap_err() {
            ZoraError::RateLimited { suggested_wait_ms } => {
                assert_eq!(suggested_wait_ms, Some(2500));
            }
            other => panic!("Expected RateLimited, got: {other:?}"),
        }
    }

    #[tokio::test]
    async fn retry_after_header_used_when_detail_is_absent() {
        let mock_server = MockServer::start().await;
        let client = ZoraClient::new(test_config(mock_server.uri())).unwrap();

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429).insert_header("retry-after", "5"))
            .mount(&mock_server)
            .await;

        let address = WalletAddress::new("vitalik.eth").unwrap();
        let result = client.execute_query(&address).await;
        match result.unwrap_err() {
            ZoraError::RateLimited { suggested_wait_ms } => {
                assert_eq!(suggested_wait_ms, Some(5000));
            }
            other => panic!("Expected RateLimited, got: {other:?}"),
        }
    }

    #[tokio::test]
    async fn malformed_success_body_is_non_retryable() {
        let mock_server = MockServer::start().await;
        let client = ZoraClient::new(test_config(mock_server.uri())).unwrap();

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&mock_server)
            .await;

        let address = WalletAddress::new("vitalik.eth").unwrap();
        let result = client.execute_query(&address).await;
        let error = result.unwrap_err();
        assert!(matches!(error, ZoraError::Json(_)));
        assert!(error.retry_wait(0, 1000).is_none());
    }
}
