//! WebSocket connection handler
//!
//! Handles individual WebSocket connections: registers the session, replays
//! recent history, forwards queued messages to the socket and turns client
//! messages into alert registrations.

use chrono::{DateTime, Utc};
use futures_util::{SinkExt, StreamExt};
use pricewatch_core::{
    Asset, ClientMessage, ErrorCode, PricewatchError, PricewatchResult, ServerMessage, SessionId,
};
use rust_decimal::Decimal;
use std::sync::Arc;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tracing::{debug, error, info, warn};

use super::session::SessionManager;
use crate::alert_registry::AlertRegistry;
use crate::history::HistoryStore;
use crate::transport::SessionTransport;

/// Session-layer settings
#[derive(Clone, Debug)]
pub struct WebSocketConfig {
    /// Assets clients may set alerts on
    pub tracked_assets: Vec<Asset>,
    /// Asset used when a client does not name one
    pub default_asset: Asset,
    /// Drop a session's alerts when it disconnects
    pub purge_alerts_on_disconnect: bool,
    /// Snapshots replayed to a client right after it connects
    pub history_replay: usize,
}

impl Default for WebSocketConfig {
    fn default() -> Self {
        let tracked_assets = vec![Asset::new("bitcoin"), Asset::new("ethereum")];
        Self {
            default_asset: tracked_assets[0].clone(),
            tracked_assets,
            purge_alerts_on_disconnect: true,
            history_replay: 50,
        }
    }
}

/// Shared state for WebSocket handlers
#[derive(Clone)]
pub struct WebSocketState {
    /// Live sessions
    pub sessions: Arc<SessionManager>,
    /// Alert registry written by `set_alert`
    pub registry: Arc<AlertRegistry>,
    /// Price history replayed to new sessions
    pub history: Arc<HistoryStore>,
    config: WebSocketConfig,
}

impl WebSocketState {
    /// Create new WebSocket state
    pub fn new(
        sessions: Arc<SessionManager>,
        registry: Arc<AlertRegistry>,
        history: Arc<HistoryStore>,
        config: WebSocketConfig,
    ) -> Self {
        Self {
            sessions,
            registry,
            history,
            config,
        }
    }

    pub fn config(&self) -> &WebSocketConfig {
        &self.config
    }

    /// Handle a new WebSocket connection
    ///
    /// Runs until the client goes away, then unregisters the session.
    pub async fn handle_connection<S>(&self, socket: S)
    where
        S: futures_util::Stream<Item = Result<Message, WsError>>
            + futures_util::Sink<Message, Error = WsError>
            + Send
            + 'static,
    {
        let mut replayed_until = None;
        let (session_id, mut outgoing_rx) = self.sessions.connect_with(|id| {
            let mut greeting = vec![ServerMessage::Connected {
                session_id: id.clone(),
            }];
            if self.config.history_replay > 0 {
                let snapshots = self.history.recent(self.config.history_replay);
                replayed_until = snapshots.first().map(|s| s.timestamp);
                greeting.push(ServerMessage::History { snapshots });
            }
            greeting
        });
        let (mut ws_sender, mut ws_receiver) = socket.split();

        // Task: Send queued messages to WebSocket
        let send_task = tokio::spawn(async move {
            while let Some(message) = outgoing_rx.recv().await {
                if already_replayed(&message, replayed_until) {
                    continue;
                }
                let json = match serde_json::to_string(&message) {
                    Ok(j) => j,
                    Err(e) => {
                        error!("Failed to serialize message: {}", e);
                        continue;
                    }
                };

                if ws_sender.send(Message::Text(json.into())).await.is_err() {
                    break;
                }
            }
        });

        // Task: Receive and process incoming messages
        let recv_task = {
            let session_id = session_id.clone();
            async move {
                while let Some(result) = ws_receiver.next().await {
                    match result {
                        Ok(Message::Close(_)) => {
                            debug!("Received close from {}", session_id);
                            break;
                        }
                        Ok(msg) => self.handle_frame(&session_id, msg),
                        Err(e) => {
                            debug!("WebSocket error for {}: {}", session_id, e);
                            break;
                        }
                    }
                }
            }
        };

        // Wait for either side to finish (connection closed)
        tokio::select! {
            _ = send_task => {}
            _ = recv_task => {}
        }

        self.on_disconnect(&session_id);
    }

    /// Unregister a session and, if configured, drop its alerts
    pub fn on_disconnect(&self, session_id: &SessionId) {
        self.sessions.disconnect(session_id);
        if self.config.purge_alerts_on_disconnect {
            let purged = self.registry.remove_session(session_id);
            if purged > 0 {
                info!("Purged {} alert(s) of {}", purged, session_id);
            }
        }
    }

    /// Handle one inbound frame; replies are queued to the session
    fn handle_frame(&self, session_id: &SessionId, msg: Message) {
        match msg {
            Message::Text(text) => {
                let reply = self.handle_text(session_id, &text);
                self.sessions.send_to_session(session_id, reply);
            }
            Message::Binary(_) => {
                self.sessions.send_to_session(
                    session_id,
                    ServerMessage::Error {
                        code: ErrorCode::InvalidMessage,
                        message: "Binary messages not supported".to_string(),
                    },
                );
            }
            Message::Ping(_) | Message::Pong(_) => {
                // Handled automatically by tungstenite
                debug!("Received ping/pong from {}", session_id);
            }
            Message::Close(_) | Message::Frame(_) => {}
        }
    }

    /// Parse a text frame and produce the reply for it
    pub fn handle_text(&self, session_id: &SessionId, text: &str) -> ServerMessage {
        match self.apply_text(session_id, text) {
            Ok(reply) => reply,
            Err(e) => {
                warn!("Error handling message from {}: {}", session_id, e);
                let code = match &e {
                    PricewatchError::UnknownAsset(_) => ErrorCode::UnknownAsset,
                    PricewatchError::InvalidMessage(_) => ErrorCode::InvalidMessage,
                };
                ServerMessage::Error {
                    code,
                    message: e.to_string(),
                }
            }
        }
    }

    fn apply_text(&self, session_id: &SessionId, text: &str) -> PricewatchResult<ServerMessage> {
        let msg: ClientMessage = serde_json::from_str(text)?;
        self.handle_client_message(session_id, msg)
    }

    /// Apply a client message and return the reply for the session
    pub fn handle_client_message(
        &self,
        session_id: &SessionId,
        msg: ClientMessage,
    ) -> Result<ServerMessage, PricewatchError> {
        match msg {
            ClientMessage::SetAlert {
                target_price,
                asset,
            } => self.set_alert(session_id, asset, target_price),
            ClientMessage::CancelAlert { asset } => {
                let asset = self.resolve_asset(asset)?;
                let removed = self.registry.remove(&asset, session_id);
                debug!("Alert cancel for {} on {}: removed={}", session_id, asset, removed);
                Ok(ServerMessage::AlertCancelled { asset, removed })
            }
            ClientMessage::Ping { timestamp } => Ok(ServerMessage::Pong {
                client_timestamp: timestamp,
                server_timestamp: Utc::now().timestamp_millis(),
            }),
        }
    }

    fn set_alert(
        &self,
        session_id: &SessionId,
        asset: Option<Asset>,
        target_price: Decimal,
    ) -> Result<ServerMessage, PricewatchError> {
        let asset = self.resolve_asset(asset)?;
        self.registry.register(&asset, session_id, target_price);

        info!("Alert set for {} on {} at ${}", session_id, asset, target_price);

        Ok(ServerMessage::AlertConfirmed {
            asset,
            target_price,
            message: format!("Alert set for ${}", target_price),
        })
    }

    fn resolve_asset(&self, asset: Option<Asset>) -> Result<Asset, PricewatchError> {
        let asset = asset.unwrap_or_else(|| self.config.default_asset.clone());
        if self.config.tracked_assets.contains(&asset) {
            Ok(asset)
        } else {
            Err(PricewatchError::unknown_asset(asset.to_string()))
        }
    }
}

/// A tick already carried by the history replay
fn already_replayed(message: &ServerMessage, replayed_until: Option<DateTime<Utc>>) -> bool {
    match (message, replayed_until) {
        (ServerMessage::PriceTick { timestamp, .. }, Some(until)) => *timestamp <= until,
        _ => false,
    }
}

impl std::fmt::Debug for WebSocketState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebSocketState")
            .field("sessions", &self.sessions)
            .field("config", &self.config)
            .finish()
    }
}
