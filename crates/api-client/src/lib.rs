// SPDX-FileCopyrightText: 2025 Glasshouse Labs
//
// SPDX-License-Identifier: Apache-2.0

//! Generic client traits and error taxonomy for indexer integrations
//!
//! This crate defines the seam between the resilient fetch layer and its
//! consumers (the image-compositing service that renders "first mint" cards).
//!
//! # Core Abstractions
//!
//! - **`ApiClient` Trait**: common interface for indexer-backed artwork lookups
//! - **Error Taxonomy**: [`ApiError`] distinguishes retryable-but-exhausted
//!   failures from terminal ones without string matching
//! - **Health Check System**: standardized [`HealthStatus`] reporting
//!
//! # Absence Is Not Failure
//!
//! A wallet that never minted anything is a normal outcome:
//! `fetch_first_minted_artwork` returns `Ok(None)` for it. Errors are reserved
//! for invalid input and for upstream failures that survived the retry policy.

use thiserror::Error;

pub mod health;
pub mod types;

pub use health::*;
pub use types::*;

/// Generic trait for indexer-backed artwork clients
///
/// Implementations own their retry policy and rate limiting; callers see only
/// the final outcome of a fetch, never intermediate attempts.
pub trait ApiClient: Send + Sync {
    /// Check the health of the upstream indexer
    ///
    /// # Errors
    ///
    /// Returns an error if the health probe cannot be issued at all
    fn health_check(&self) -> impl Future<Output = Result<HealthStatus, ApiError>> + Send;

    /// Fetch the preview media URI of the first item a wallet minted/collected
    ///
    /// # Arguments
    ///
    /// * `address` - Wallet address or identifier understood by the indexer
    ///
    /// # Returns
    ///
    /// * `Ok(Some(artwork))` if the wallet has a first collected item with media
    /// * `Ok(None)` if the wallet exists but has no collected media
    /// * `Err(error)` for invalid input or a terminal upstream failure
    ///
    /// # Errors
    ///
    /// Returns an error only after retries are exhausted or on invalid input /
    /// non-retryable upstream responses
    fn fetch_first_minted_artwork(
        &self,
        address: &str,
    ) -> impl Future<Output = Result<Option<MintedArtwork>, ApiError>> + Send;

    /// Get the name/identifier of this client
    fn name(&self) -> &'static str;
}

/// Common errors surfaced by artwork clients
///
/// The variants mirror the retry policy: `RateLimitExceeded`, `Forbidden` and
/// `TransientNetwork` are only produced after the retry budget is spent, while
/// `InvalidInput` and `NonRetryableApi` are terminal on first sight.
#[derive(Debug, Error)]
#[allow(missing_docs)]
pub enum ApiError {
    /// Malformed or missing wallet address, rejected before any network work
    #[error("invalid wallet address: {message}")]
    InvalidInput { message: String },

    /// Upstream kept returning 429 until the retry budget was spent
    #[error("rate limit exceeded fetching first mint for {address}")]
    RateLimitExceeded { address: String },

    /// Upstream kept returning 403 until the retry budget was spent
    #[error("upstream forbade requests while fetching first mint for {address}")]
    Forbidden { address: String },

    /// Connection failures, timeouts or 5xx that survived all retries
    #[error("transient network failure fetching first mint for {address}: {message}")]
    TransientNetwork { address: String, message: String },

    /// Any other upstream failure; retrying would not help
    #[error("non-retryable API failure fetching first mint for {address}: {message}")]
    NonRetryableApi { address: String, message: String },

    /// Client construction or configuration error
    #[error("configuration error: {message}")]
    Configuration { message: String },

    /// Client independent error
    #[error(transparent)]
    Custom { error: anyhow::Error },
}

impl ApiError {
    /// Whether this error was produced after a retryable failure class ran out
    /// of attempts, as opposed to a failure that was terminal on first sight.
    pub fn is_exhausted_retryable(&self) -> bool {
        matches!(
            self,
            ApiError::RateLimitExceeded { .. }
                | ApiError::Forbidden { .. }
                | ApiError::TransientNetwork { .. }
        )
    }
}
