//! Service configuration loaded from environment variables

use pricewatch_core::{Asset, TriggerDirection};
use pricewatch_feed::{COINGECKO_API_BASE, DEFAULT_VS_CURRENCY};
use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::history::DEFAULT_HISTORY_CAPACITY;
use crate::websocket::WebSocketConfig;
use crate::worker::{WorkerConfig, DEFAULT_POLL_INTERVAL};

const DEFAULT_ASSETS: &str = "bitcoin,ethereum";
const DEFAULT_SERVER_PORT: u16 = 3000;
/// One day
const MAX_POLL_INTERVAL_SECS: u64 = 86_400;

/// Full service configuration
#[derive(Debug, Clone)]
pub struct PricewatchConfig {
    /// Assets polled and accepted for alerts
    pub assets: Vec<Asset>,
    /// Quote currency for upstream prices
    pub vs_currency: String,
    /// Base URL of the upstream price API
    pub api_url: String,
    pub poll_interval: Duration,
    pub history_capacity: usize,
    pub trigger_direction: TriggerDirection,
    /// Asset used when `set_alert` does not name one
    pub default_asset: Asset,
    pub purge_alerts_on_disconnect: bool,
    pub server_port: u16,
}

impl PricewatchConfig {
    /// Load configuration from environment variables
    ///
    /// Reads:
    /// - PRICE_ASSETS: comma-separated asset ids (default `bitcoin,ethereum`)
    /// - PRICE_VS_CURRENCY, PRICE_API_URL
    /// - POLL_INTERVAL_SECS, HISTORY_CAPACITY
    /// - ALERT_TRIGGER_DIRECTION: `rising` or `falling`
    /// - DEFAULT_ALERT_ASSET: must be one of PRICE_ASSETS
    /// - PURGE_ALERTS_ON_DISCONNECT, SERVER_PORT
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let raw_assets = get("PRICE_ASSETS").unwrap_or_else(|| DEFAULT_ASSETS.to_string());
        let mut assets: Vec<Asset> = Vec::new();
        for part in raw_assets.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            let asset = Asset::new(part);
            if !assets.contains(&asset) {
                assets.push(asset);
            }
        }
        if assets.is_empty() {
            return Err(ConfigError::EmptyAssetList);
        }

        let poll_secs: u64 = parse_or(get("POLL_INTERVAL_SECS"), "POLL_INTERVAL_SECS", DEFAULT_POLL_INTERVAL.as_secs())?;
        if poll_secs == 0 || poll_secs > MAX_POLL_INTERVAL_SECS {
            return Err(ConfigError::InvalidValue {
                field: "POLL_INTERVAL_SECS".to_string(),
                value: poll_secs.to_string(),
            });
        }

        let history_capacity = parse_or(get("HISTORY_CAPACITY"), "HISTORY_CAPACITY", DEFAULT_HISTORY_CAPACITY)?;
        if history_capacity == 0 {
            return Err(ConfigError::InvalidValue {
                field: "HISTORY_CAPACITY".to_string(),
                value: "0".to_string(),
            });
        }

        let trigger_direction = match get("ALERT_TRIGGER_DIRECTION") {
            Some(raw) => TriggerDirection::from_str(&raw).map_err(|_| ConfigError::InvalidValue {
                field: "ALERT_TRIGGER_DIRECTION".to_string(),
                value: raw,
            })?,
            None => TriggerDirection::default(),
        };

        let default_asset = match get("DEFAULT_ALERT_ASSET") {
            Some(raw) => {
                let asset = Asset::new(raw.as_str());
                if !assets.contains(&asset) {
                    return Err(ConfigError::UntrackedDefaultAsset(asset.to_string()));
                }
                asset
            }
            None => assets[0].clone(),
        };

        let purge_alerts_on_disconnect = match get("PURGE_ALERTS_ON_DISCONNECT") {
            Some(raw) => parse_bool(&raw).ok_or(ConfigError::InvalidValue {
                field: "PURGE_ALERTS_ON_DISCONNECT".to_string(),
                value: raw,
            })?,
            None => true,
        };

        Ok(Self {
            assets,
            vs_currency: get("PRICE_VS_CURRENCY")
                .map(|v| v.trim().to_lowercase())
                .unwrap_or_else(|| DEFAULT_VS_CURRENCY.to_string()),
            api_url: get("PRICE_API_URL").unwrap_or_else(|| COINGECKO_API_BASE.to_string()),
            poll_interval: Duration::from_secs(poll_secs),
            history_capacity,
            trigger_direction,
            default_asset,
            purge_alerts_on_disconnect,
            server_port: parse_or(get("SERVER_PORT"), "SERVER_PORT", DEFAULT_SERVER_PORT)?,
        })
    }

    pub fn worker_config(&self) -> WorkerConfig {
        WorkerConfig {
            assets: self.assets.clone(),
            poll_interval: self.poll_interval,
        }
    }

    pub fn websocket_config(&self) -> WebSocketConfig {
        WebSocketConfig {
            tracked_assets: self.assets.clone(),
            default_asset: self.default_asset.clone(),
            purge_alerts_on_disconnect: self.purge_alerts_on_disconnect,
            history_replay: self.history_capacity,
        }
    }
}

fn parse_or<T: FromStr>(raw: Option<String>, field: &str, default: T) -> Result<T, ConfigError> {
    match raw {
        Some(value) => value.trim().parse().map_err(|_| ConfigError::InvalidValue {
            field: field.to_string(),
            value,
        }),
        None => Ok(default),
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {field}: {value}")]
    InvalidValue { field: String, value: String },

    #[error("PRICE_ASSETS cannot be empty")]
    EmptyAssetList,

    #[error("DEFAULT_ALERT_ASSET {0} is not listed in PRICE_ASSETS")]
    UntrackedDefaultAsset(String),
}
