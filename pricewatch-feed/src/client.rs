//! CoinGecko API client
//!
//! Fetches current prices for a fixed set of assets from the public
//! `simple/price` endpoint.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use std::time::Duration;
use tracing::{debug, instrument};

use pricewatch_core::{Asset, PriceSnapshot};

use crate::types::{extract_prices, SimplePriceResponse, COINGECKO_API_BASE, DEFAULT_VS_CURRENCY};
use crate::{FeedError, PriceFeed};

/// Upstream requests are abandoned after this long
const REQUEST_TIMEOUT_SECS: u64 = 10;

/// CoinGecko price client
#[derive(Clone)]
pub struct CoinGeckoClient {
    client: Client,
    base_url: String,
    vs_currency: String,
}

impl CoinGeckoClient {
    /// Create a client against the public API quoting in USD
    pub fn new() -> Result<Self, FeedError> {
        Self::with_base_url(COINGECKO_API_BASE, DEFAULT_VS_CURRENCY)
    }

    /// Create a client against a custom base URL and quote currency
    pub fn with_base_url(
        base_url: impl Into<String>,
        vs_currency: impl Into<String>,
    ) -> Result<Self, FeedError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| FeedError::InvalidConfig(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            vs_currency: vs_currency.into().to_lowercase(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn vs_currency(&self) -> &str {
        &self.vs_currency
    }

    /// Build the `simple/price` URL for a set of assets
    pub fn price_url(&self, assets: &[Asset]) -> String {
        let ids = assets
            .iter()
            .map(|a| a.as_str())
            .collect::<Vec<_>>()
            .join(",");
        format!(
            "{}/simple/price?ids={}&vs_currencies={}",
            self.base_url, ids, self.vs_currency
        )
    }
}

#[async_trait]
impl PriceFeed for CoinGeckoClient {
    #[instrument(skip(self))]
    async fn fetch_prices(&self, assets: &[Asset]) -> Result<PriceSnapshot, FeedError> {
        let url = self.price_url(assets);
        debug!("Fetching prices from: {}", url);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| FeedError::Request(e.to_string()))?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(FeedError::RateLimited);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(FeedError::Api {
                status: status.as_u16(),
                message: body,
            });
        }

        let body: SimplePriceResponse = response
            .json()
            .await
            .map_err(|e| FeedError::Parse(format!("Failed to parse price response: {}", e)))?;

        let prices = extract_prices(&body, assets, &self.vs_currency)?;
        Ok(PriceSnapshot::now(prices))
    }
}

impl std::fmt::Debug for CoinGeckoClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoinGeckoClient")
            .field("base_url", &self.base_url)
            .field("vs_currency", &self.vs_currency)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_price_url() {
        let client = CoinGeckoClient::with_base_url("http://localhost:9999/api/v3/", "USD").unwrap();
        let url = client.price_url(&[Asset::new("bitcoin"), Asset::new("ethereum")]);
        assert_eq!(
            url,
            "http://localhost:9999/api/v3/simple/price?ids=bitcoin,ethereum&vs_currencies=usd"
        );
    }

    #[test]
    fn test_default_client() {
        let client = CoinGeckoClient::new().unwrap();
        assert_eq!(client.base_url(), COINGECKO_API_BASE);
        assert_eq!(client.vs_currency(), "usd");
    }
}
