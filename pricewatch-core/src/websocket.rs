//! WebSocket message types for live prices and alerts
//!
//! These types define the protocol for WebSocket communication between
//! the server and clients.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::{AlertEvent, Asset, BroadcastEvent, PriceSnapshot, SessionId};

// ============================================================================
// Client -> Server Messages
// ============================================================================

/// Messages sent from client to server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Register (or replace) an alert for this session
    SetAlert {
        target_price: Decimal,
        /// Asset to watch; the server's default asset when omitted
        #[serde(default)]
        asset: Option<Asset>,
    },
    /// Drop this session's alert on an asset
    CancelAlert {
        #[serde(default)]
        asset: Option<Asset>,
    },
    /// Ping to keep connection alive
    Ping {
        /// Client timestamp
        timestamp: i64,
    },
}

// ============================================================================
// Server -> Client Messages
// ============================================================================

/// Messages sent from server to client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Sent once after the connection is established
    Connected { session_id: SessionId },
    /// Recent snapshots, newest first, for clients joining late
    History { snapshots: Vec<PriceSnapshot> },
    /// Latest prices for every tracked asset
    PriceTick {
        prices: BTreeMap<Asset, Decimal>,
        timestamp: DateTime<Utc>,
    },
    /// One of this session's alerts fired
    AlertPopup {
        asset: Asset,
        price: Decimal,
        target_price: Decimal,
        message: String,
    },
    /// Alert registration accepted
    AlertConfirmed {
        asset: Asset,
        target_price: Decimal,
        message: String,
    },
    /// Alert cancellation processed
    AlertCancelled { asset: Asset, removed: bool },
    /// Error message
    Error { code: ErrorCode, message: String },
    /// Pong response to client ping
    Pong {
        /// Echo back client timestamp
        client_timestamp: i64,
        /// Server timestamp
        server_timestamp: i64,
    },
}

impl From<BroadcastEvent> for ServerMessage {
    fn from(event: BroadcastEvent) -> Self {
        ServerMessage::PriceTick {
            prices: event.prices,
            timestamp: event.timestamp,
        }
    }
}

impl From<AlertEvent> for ServerMessage {
    fn from(event: AlertEvent) -> Self {
        ServerMessage::AlertPopup {
            asset: event.asset,
            price: event.price,
            target_price: event.target_price,
            message: event.message,
        }
    }
}

/// Error codes for WebSocket errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    /// Invalid message format
    InvalidMessage,
    /// Asset is not tracked by this server
    UnknownAsset,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_parse_set_alert() {
        let msg: ClientMessage =
            serde_json::from_str(r#"{"type":"set_alert","target_price":95000,"asset":"Bitcoin"}"#)
                .unwrap();
        assert_eq!(
            msg,
            ClientMessage::SetAlert {
                target_price: dec!(95000),
                asset: Some(Asset::new("bitcoin")),
            }
        );
    }

    #[test]
    fn test_parse_set_alert_without_asset() {
        let msg: ClientMessage =
            serde_json::from_str(r#"{"type":"set_alert","target_price":"3100.5"}"#).unwrap();
        assert_eq!(
            msg,
            ClientMessage::SetAlert {
                target_price: dec!(3100.5),
                asset: None,
            }
        );
    }

    #[test]
    fn test_reject_non_numeric_target() {
        let result =
            serde_json::from_str::<ClientMessage>(r#"{"type":"set_alert","target_price":"soon"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_alert_popup_tag() {
        let msg = ServerMessage::AlertPopup {
            asset: Asset::new("bitcoin"),
            price: dec!(96000),
            target_price: dec!(95000),
            message: "bitcoin has reached $96000!".to_string(),
        };
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["type"], "alert_popup");
        assert_eq!(json["asset"], "bitcoin");
    }
}
