//! WebSocket session layer
//!
//! This module tracks live client sessions, delivers bus traffic to them
//! and handles the messages clients send (alert registration).

mod handler;
mod session;

pub use handler::{WebSocketConfig, WebSocketState};
pub use session::{SessionManager, SESSION_QUEUE_CAPACITY};
