//! Tracked asset identifiers

use serde::{Deserialize, Serialize};
use std::fmt;

/// Prefix of the per-asset alert registry key
const ALERT_KEY_PREFIX: &str = "alerts:";

/// Identifier of a tracked asset as the upstream API names it
/// (e.g. `bitcoin`, `ethereum`).
///
/// Identifiers are normalized to lowercase so `Bitcoin` and `bitcoin`
/// address the same registry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct Asset(String);

impl Asset {
    pub fn new(id: impl AsRef<str>) -> Self {
        Asset(id.as_ref().trim().to_lowercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Key of this asset's alert registry (`alerts:<asset>`)
    pub fn registry_key(&self) -> String {
        format!("{}{}", ALERT_KEY_PREFIX, self.0)
    }
}

impl fmt::Display for Asset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for Asset {
    fn from(id: String) -> Self {
        Asset::new(id)
    }
}

impl From<&str> for Asset {
    fn from(id: &str) -> Self {
        Asset::new(id)
    }
}

impl From<Asset> for String {
    fn from(asset: Asset) -> Self {
        asset.0
    }
}

impl std::str::FromStr for Asset {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err("Asset identifier cannot be empty".to_string());
        }
        Ok(Asset::new(trimmed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_asset_is_normalized() {
        assert_eq!(Asset::new(" Bitcoin "), Asset::new("bitcoin"));
        assert_eq!(Asset::new("ETHEREUM").as_str(), "ethereum");
    }

    #[test]
    fn test_registry_key() {
        assert_eq!(Asset::new("bitcoin").registry_key(), "alerts:bitcoin");
    }

    #[test]
    fn test_parse_rejects_empty() {
        assert!("  ".parse::<Asset>().is_err());
        assert_eq!("solana".parse::<Asset>().unwrap(), Asset::new("solana"));
    }

    #[test]
    fn test_deserialize_normalizes() {
        let asset: Asset = serde_json::from_str("\"BitCoin\"").unwrap();
        assert_eq!(asset, Asset::new("bitcoin"));
        assert_eq!(serde_json::to_string(&asset).unwrap(), "\"bitcoin\"");
    }
}
