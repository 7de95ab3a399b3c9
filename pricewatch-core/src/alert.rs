//! Threshold alert types

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::{Asset, SessionId};

/// Which side of the target price fires an alert
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TriggerDirection {
    /// Fire once the price rises to or above the target (`target <= price`)
    #[default]
    Rising,
    /// Fire once the price drops to or below the target (`target >= price`)
    Falling,
}

impl TriggerDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            TriggerDirection::Rising => "rising",
            TriggerDirection::Falling => "falling",
        }
    }
}

impl fmt::Display for TriggerDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for TriggerDirection {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "rising" | "above" | "up" => Ok(TriggerDirection::Rising),
            "falling" | "below" | "down" => Ok(TriggerDirection::Falling),
            _ => Err(format!("Unknown trigger direction: {}", s)),
        }
    }
}

/// A client's pending alert on one asset.
///
/// There is at most one live entry per (session, asset) pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertEntry {
    pub session_id: SessionId,
    pub asset: Asset,
    pub target_price: Decimal,
}

impl AlertEntry {
    pub fn new(session_id: SessionId, asset: Asset, target_price: Decimal) -> Self {
        Self {
            session_id,
            asset,
            target_price,
        }
    }
}

/// Targeted notification that an alert has fired
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertEvent {
    /// Session the notification is addressed to
    pub session_id: SessionId,
    pub asset: Asset,
    /// Price that satisfied the alert
    pub price: Decimal,
    /// Target the client registered
    pub target_price: Decimal,
    /// Human readable notification text
    pub message: String,
}

impl AlertEvent {
    /// Build the notification for an entry met at `price`
    pub fn triggered(entry: &AlertEntry, price: Decimal) -> Self {
        Self {
            session_id: entry.session_id.clone(),
            asset: entry.asset.clone(),
            price,
            target_price: entry.target_price,
            message: format!("{} has reached ${}!", entry.asset, price),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_direction_defaults_to_rising() {
        assert_eq!(TriggerDirection::default(), TriggerDirection::Rising);
        assert_eq!(TriggerDirection::Falling.to_string(), "falling");
    }

    #[test]
    fn test_parse_direction() {
        assert_eq!("Rising".parse::<TriggerDirection>().unwrap(), TriggerDirection::Rising);
        assert_eq!("below".parse::<TriggerDirection>().unwrap(), TriggerDirection::Falling);
        assert!("sideways".parse::<TriggerDirection>().is_err());
    }

    #[test]
    fn test_triggered_event_names_the_asset() {
        let entry = AlertEntry::new(SessionId::from("s-1"), Asset::new("ethereum"), dec!(3000));
        let event = AlertEvent::triggered(&entry, dec!(3100.25));

        assert_eq!(event.session_id, SessionId::from("s-1"));
        assert_eq!(event.target_price, dec!(3000));
        assert_eq!(event.message, "ethereum has reached $3100.25!");
    }
}
