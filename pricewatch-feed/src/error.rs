//! Error types for the price feed

use thiserror::Error;

/// Errors that can occur while fetching upstream prices
#[derive(Debug, Error)]
pub enum FeedError {
    /// Upstream signalled rate limiting (HTTP 429)
    #[error("Rate limit exceeded")]
    RateLimited,

    /// HTTP request failed (connect error, timeout, ...)
    #[error("Request failed: {0}")]
    Request(String),

    /// API returned a non-success response
    #[error("API error (status {status}): {message}")]
    Api {
        /// HTTP status code
        status: u16,
        /// Response body
        message: String,
    },

    /// Failed to parse API response
    #[error("Parse error: {0}")]
    Parse(String),

    /// Response did not carry a price for a requested asset
    #[error("No price returned for {asset} in {currency}")]
    MissingAsset { asset: String, currency: String },

    /// Client could not be constructed
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl FeedError {
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, FeedError::RateLimited)
    }
}
