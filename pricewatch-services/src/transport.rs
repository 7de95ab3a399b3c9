//! Delivery capability of the session layer
//!
//! The bridge only ever addresses sessions through this trait: it can fan a
//! message out to everyone or hand it to one session by id, and it never
//! sees or owns a connection.

use pricewatch_core::{ServerMessage, SessionId};

/// Delivers messages to live client sessions.
///
/// Delivery is fire-and-forget: there is no acknowledgment and a session
/// that cannot take the message right now simply misses it.
pub trait SessionTransport: Send + Sync {
    /// Deliver to every live session; returns how many accepted it
    fn broadcast_to_all(&self, message: &ServerMessage) -> usize;

    /// Deliver to one session; `false` when it is not live or not accepting
    fn send_to_session(&self, session_id: &SessionId, message: ServerMessage) -> bool;

    /// Whether `session_id` is currently connected
    fn is_live(&self, session_id: &SessionId) -> bool;

    /// Number of live sessions
    fn session_count(&self) -> usize;
}
