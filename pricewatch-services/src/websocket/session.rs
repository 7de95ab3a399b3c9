//! Session manager for WebSocket connections
//!
//! Maps each session id to the outgoing queue of its connection. Queues are
//! bounded; a message that does not fit is dropped for that session only.

use dashmap::DashMap;
use pricewatch_core::{ServerMessage, SessionId};
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, info};

use crate::transport::SessionTransport;

/// Outgoing messages buffered per session before new ones are dropped
pub const SESSION_QUEUE_CAPACITY: usize = 100;

/// Tracks live sessions and delivers messages to them
pub struct SessionManager {
    /// Map of session ID -> outgoing message queue
    sessions: DashMap<SessionId, mpsc::Sender<ServerMessage>>,
    queue_capacity: usize,
}

impl SessionManager {
    /// Create a new session manager
    pub fn new() -> Self {
        Self::with_queue_capacity(SESSION_QUEUE_CAPACITY)
    }

    pub fn with_queue_capacity(queue_capacity: usize) -> Self {
        Self {
            sessions: DashMap::new(),
            queue_capacity: queue_capacity.max(1),
        }
    }

    /// Register a new session and return its id and outgoing queue
    pub fn connect(&self) -> (SessionId, mpsc::Receiver<ServerMessage>) {
        self.connect_with(|_| Vec::new())
    }

    /// Register a new session whose queue starts with `greeting`.
    ///
    /// The greeting is queued before the session becomes reachable, so no
    /// broadcast can overtake it.
    pub fn connect_with<F>(&self, greeting: F) -> (SessionId, mpsc::Receiver<ServerMessage>)
    where
        F: FnOnce(&SessionId) -> Vec<ServerMessage>,
    {
        let session_id = SessionId::generate();
        let (tx, rx) = mpsc::channel(self.queue_capacity);
        for message in greeting(&session_id) {
            Self::deliver(&session_id, &tx, message);
        }
        self.sessions.insert(session_id.clone(), tx);
        info!("User connected: {}", session_id);
        (session_id, rx)
    }

    /// Forget a session. Later deliveries to it are dropped.
    pub fn disconnect(&self, session_id: &SessionId) -> bool {
        let removed = self.sessions.remove(session_id).is_some();
        if removed {
            info!("User disconnected: {}", session_id);
        }
        removed
    }

    fn deliver(
        session_id: &SessionId,
        tx: &mpsc::Sender<ServerMessage>,
        message: ServerMessage,
    ) -> bool {
        match tx.try_send(message) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                debug!("Queue full for {}, dropping message", session_id);
                false
            }
            Err(TrySendError::Closed(_)) => {
                debug!("Session {} is closing, dropping message", session_id);
                false
            }
        }
    }
}

impl SessionTransport for SessionManager {
    fn broadcast_to_all(&self, message: &ServerMessage) -> usize {
        self.sessions
            .iter()
            .filter(|entry| Self::deliver(entry.key(), entry.value(), message.clone()))
            .count()
    }

    fn send_to_session(&self, session_id: &SessionId, message: ServerMessage) -> bool {
        match self.sessions.get(session_id) {
            Some(tx) => Self::deliver(session_id, tx.value(), message),
            None => {
                debug!("Session {} not connected, dropping message", session_id);
                false
            }
        }
    }

    fn is_live(&self, session_id: &SessionId) -> bool {
        self.sessions.contains_key(session_id)
    }

    fn session_count(&self) -> usize {
        self.sessions.len()
    }
}

impl Default for SessionManager {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionManager")
            .field("sessions", &self.sessions.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pricewatch_core::ErrorCode;

    fn message(text: &str) -> ServerMessage {
        ServerMessage::Error {
            code: ErrorCode::InvalidMessage,
            message: text.to_string(),
        }
    }

    #[tokio::test]
    async fn test_broadcast_reaches_every_live_session() {
        let manager = SessionManager::new();
        let (_a, mut rx_a) = manager.connect();
        let (_b, mut rx_b) = manager.connect();

        assert_eq!(manager.broadcast_to_all(&message("tick")), 2);
        assert_eq!(rx_a.recv().await.unwrap(), message("tick"));
        assert_eq!(rx_b.recv().await.unwrap(), message("tick"));
    }

    #[tokio::test]
    async fn test_greeting_is_queued_before_session_is_reachable() {
        let manager = SessionManager::new();
        let (session, mut rx) = manager.connect_with(|id| {
            assert!(!manager.is_live(id));
            // Nothing can reach the session yet
            assert_eq!(manager.broadcast_to_all(&message("early")), 0);
            vec![message("hello"), message("replay")]
        });

        assert!(manager.is_live(&session));
        manager.broadcast_to_all(&message("tick"));

        assert_eq!(rx.recv().await.unwrap(), message("hello"));
        assert_eq!(rx.recv().await.unwrap(), message("replay"));
        assert_eq!(rx.recv().await.unwrap(), message("tick"));
    }

    #[tokio::test]
    async fn test_targeted_delivery() {
        let manager = SessionManager::new();
        let (a, mut rx_a) = manager.connect();
        let (_b, mut rx_b) = manager.connect();

        assert!(manager.send_to_session(&a, message("for a")));
        assert_eq!(rx_a.recv().await.unwrap(), message("for a"));
        assert!(rx_b.try_recv().is_err());
    }

    #[test]
    fn test_unknown_session_is_dropped() {
        let manager = SessionManager::new();
        assert!(!manager.send_to_session(&SessionId::from("ghost"), message("lost")));
    }

    #[test]
    fn test_disconnect() {
        let manager = SessionManager::new();
        let (a, _rx) = manager.connect();
        assert!(manager.is_live(&a));

        assert!(manager.disconnect(&a));
        assert!(!manager.is_live(&a));
        assert!(!manager.disconnect(&a));
        assert_eq!(manager.broadcast_to_all(&message("tick")), 0);
    }

    #[test]
    fn test_full_queue_drops_without_blocking() {
        let manager = SessionManager::with_queue_capacity(1);
        let (a, _rx) = manager.connect();

        assert!(manager.send_to_session(&a, message("first")));
        assert!(!manager.send_to_session(&a, message("second")));
    }

    #[test]
    fn test_closed_receiver_is_dropped() {
        let manager = SessionManager::new();
        let (a, rx) = manager.connect();
        drop(rx);
        assert!(!manager.send_to_session(&a, message("late")));
    }
}
