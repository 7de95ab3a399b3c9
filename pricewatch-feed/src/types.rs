//! CoinGecko API response types

use rust_decimal::Decimal;
use std::collections::{BTreeMap, HashMap};

use pricewatch_core::Asset;

use crate::FeedError;

/// Base URL for the public CoinGecko API
pub const COINGECKO_API_BASE: &str = "https://api.coingecko.com/api/v3";

/// Quote currency used when none is configured
pub const DEFAULT_VS_CURRENCY: &str = "usd";

/// Body of `GET /simple/price`: `{ "<asset>": { "<currency>": <price> } }`
pub type SimplePriceResponse = HashMap<String, HashMap<String, Decimal>>;

/// Pick the price of every requested asset out of a `simple/price` body.
///
/// Every requested asset must be present; a partial answer is treated as a
/// failed fetch rather than a snapshot with holes in it.
pub fn extract_prices(
    response: &SimplePriceResponse,
    assets: &[Asset],
    vs_currency: &str,
) -> Result<BTreeMap<Asset, Decimal>, FeedError> {
    let mut prices = BTreeMap::new();

    for asset in assets {
        let price = response
            .get(asset.as_str())
            .and_then(|quotes| quotes.get(vs_currency))
            .copied()
            .ok_or_else(|| FeedError::MissingAsset {
                asset: asset.to_string(),
                currency: vs_currency.to_string(),
            })?;
        prices.insert(asset.clone(), price);
    }

    Ok(prices)
}
