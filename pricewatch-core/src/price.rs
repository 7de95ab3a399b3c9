//! Price snapshots produced by the polling worker

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::Asset;

/// Prices of every tracked asset at one point in time.
///
/// Produced once per successful fetch cycle and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceSnapshot {
    /// Current price per asset, in the configured quote currency
    pub prices: BTreeMap<Asset, Decimal>,
    /// When the snapshot was taken
    pub timestamp: DateTime<Utc>,
}

impl PriceSnapshot {
    pub fn new(prices: BTreeMap<Asset, Decimal>, timestamp: DateTime<Utc>) -> Self {
        Self { prices, timestamp }
    }

    /// Snapshot stamped with the current time
    pub fn now(prices: BTreeMap<Asset, Decimal>) -> Self {
        Self::new(prices, Utc::now())
    }

    pub fn price_of(&self, asset: &Asset) -> Option<Decimal> {
        self.prices.get(asset).copied()
    }
}
