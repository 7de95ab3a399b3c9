//! Service layer for Pricewatch
//!
//! This crate wires the price pipeline together: the polling worker, the
//! rolling history, the alert registry and matcher, the pub/sub bus with
//! its bridge, and the WebSocket session layer that clients talk to.

pub mod alert_registry;
pub mod bridge;
pub mod bus;
pub mod config;
pub mod history;
pub mod matcher;
pub mod publisher;
pub mod transport;
pub mod websocket;
pub mod worker;

pub use alert_registry::AlertRegistry;
pub use bridge::{Bridge, BridgeState, Delivery};
pub use bus::{BusError, BusSubscription, InMemoryBus, MessageBus, DEFAULT_BUS_CAPACITY};
pub use config::{ConfigError, PricewatchConfig};
pub use history::{HistoryStore, DEFAULT_HISTORY_CAPACITY};
pub use matcher::{AlertMatcher, MatchReport};
pub use publisher::Publisher;
pub use transport::SessionTransport;
pub use websocket::{SessionManager, WebSocketConfig, WebSocketState, SESSION_QUEUE_CAPACITY};
pub use worker::{CycleOutcome, PriceWorker, WorkerConfig, WorkerHealth, DEFAULT_POLL_INTERVAL};
