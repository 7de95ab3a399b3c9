//! Core types for Pricewatch
//!
//! This crate defines the shared data structures used across the workspace:
//! tracked assets, price snapshots, alert entries and events, the pub/sub
//! channel names and the WebSocket protocol spoken with clients.

pub mod alert;
pub mod asset;
pub mod bus;
pub mod error;
pub mod price;
pub mod session;
pub mod websocket;

pub use alert::{AlertEntry, AlertEvent, TriggerDirection};
pub use asset::Asset;
pub use bus::{BroadcastEvent, BusMessage, Channel};
pub use error::{PricewatchError, PricewatchResult};
pub use price::PriceSnapshot;
pub use session::SessionId;
pub use websocket::{ClientMessage, ErrorCode, ServerMessage};
