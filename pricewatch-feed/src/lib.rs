//! Upstream price feed for Pricewatch
//!
//! This crate provides the [`PriceFeed`] abstraction the polling worker
//! depends on, and a client for the CoinGecko `simple/price` endpoint.
//!
//! The upstream base URL and quote currency can be overridden through
//! `PRICE_API_URL` and `PRICE_VS_CURRENCY` (see the service configuration).

pub mod client;
pub mod error;
pub mod types;

pub use client::CoinGeckoClient;
pub use error::FeedError;
pub use types::{SimplePriceResponse, COINGECKO_API_BASE, DEFAULT_VS_CURRENCY};

use async_trait::async_trait;
use pricewatch_core::{Asset, PriceSnapshot};

/// Source of current prices for a fixed set of assets
#[async_trait]
pub trait PriceFeed: Send + Sync {
    /// Fetch the current price of every asset in `assets`.
    ///
    /// Returns [`FeedError::RateLimited`] when the upstream asks us to back
    /// off, so callers can tell a throttled cycle from a broken one.
    async fn fetch_prices(&self, assets: &[Asset]) -> Result<PriceSnapshot, FeedError>;
}
