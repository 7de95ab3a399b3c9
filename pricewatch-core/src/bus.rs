//! Pub/sub channel names and the records carried on them

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::{Asset, PriceSnapshot};

/// Logical channels on the bus between the worker and the session layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    /// Broadcast price ticks, one per fetch cycle
    PriceUpdates,
    /// Targeted alert notifications, one per fired alert
    AlertNotifications,
}

impl Channel {
    pub const ALL: [Channel; 2] = [Channel::PriceUpdates, Channel::AlertNotifications];

    /// Wire name of the channel
    pub fn name(&self) -> &'static str {
        match self {
            Channel::PriceUpdates => "price_updates",
            Channel::AlertNotifications => "alert_notifications",
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl std::str::FromStr for Channel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "price_updates" => Ok(Channel::PriceUpdates),
            "alert_notifications" => Ok(Channel::AlertNotifications),
            _ => Err(format!("Unknown channel: {}", s)),
        }
    }
}

/// A raw message as it travels over the bus
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BusMessage {
    pub channel: Channel,
    /// Serialized record (`BroadcastEvent` or `AlertEvent` as JSON)
    pub payload: String,
}

impl BusMessage {
    pub fn new(channel: Channel, payload: impl Into<String>) -> Self {
        Self {
            channel,
            payload: payload.into(),
        }
    }
}

/// Price tick fanned out to every connected client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BroadcastEvent {
    pub prices: BTreeMap<Asset, Decimal>,
    pub timestamp: DateTime<Utc>,
}

impl From<&PriceSnapshot> for BroadcastEvent {
    fn from(snapshot: &PriceSnapshot) -> Self {
        Self {
            prices: snapshot.prices.clone(),
            timestamp: snapshot.timestamp,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_names() {
        assert_eq!(Channel::PriceUpdates.name(), "price_updates");
        assert_eq!(Channel::AlertNotifications.to_string(), "alert_notifications");
        assert_eq!("price_updates".parse::<Channel>().unwrap(), Channel::PriceUpdates);
        assert!("prices".parse::<Channel>().is_err());
    }
}
