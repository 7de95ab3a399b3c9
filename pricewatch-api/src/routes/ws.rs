//! WebSocket route handler
//!
//! Upgrades the HTTP connection and hands the socket to the session layer,
//! which speaks `tokio-tungstenite` messages.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
    routing::get,
    Router,
};
use futures_util::{Sink, Stream};
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio_tungstenite::tungstenite::{self, Error as WsError};
use tracing::info;

use crate::AppState;

/// Create WebSocket routes
pub fn routes() -> Router<AppState> {
    Router::new().route("/ws", get(ws_handler))
}

/// WebSocket upgrade handler
async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    info!("WebSocket upgrade request received");
    ws.on_upgrade(move |socket| async move {
        state
            .ws_state
            .handle_connection(SocketAdapter { inner: socket })
            .await;
    })
}

/// Presents an axum socket as a tungstenite message stream and sink
struct SocketAdapter {
    inner: WebSocket,
}

fn into_tungstenite(msg: Message) -> tungstenite::Message {
    match msg {
        Message::Text(text) => tungstenite::Message::Text(text.to_string().into()),
        Message::Binary(data) => tungstenite::Message::Binary(data.to_vec().into()),
        Message::Ping(data) => tungstenite::Message::Ping(data.to_vec().into()),
        Message::Pong(data) => tungstenite::Message::Pong(data.to_vec().into()),
        Message::Close(_) => tungstenite::Message::Close(None),
    }
}

/// `None` for raw frames, which axum never carries
fn from_tungstenite(msg: tungstenite::Message) -> Option<Message> {
    Some(match msg {
        tungstenite::Message::Text(text) => Message::Text(text.to_string().into()),
        tungstenite::Message::Binary(data) => Message::Binary(data.to_vec().into()),
        tungstenite::Message::Ping(data) => Message::Ping(data.to_vec().into()),
        tungstenite::Message::Pong(data) => Message::Pong(data.to_vec().into()),
        tungstenite::Message::Close(_) => Message::Close(None),
        tungstenite::Message::Frame(_) => return None,
    })
}

fn io_error(e: axum::Error) -> WsError {
    WsError::Io(std::io::Error::other(e.to_string()))
}

impl Stream for SocketAdapter {
    type Item = Result<tungstenite::Message, WsError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.inner)
            .poll_next(cx)
            .map(|item| item.map(|res| res.map(into_tungstenite).map_err(io_error)))
    }
}

impl Sink<tungstenite::Message> for SocketAdapter {
    type Error = WsError;

    fn poll_ready(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Pin::new(&mut self.inner).poll_ready(cx).map_err(io_error)
    }

    fn start_send(mut self: Pin<&mut Self>, item: tungstenite::Message) -> Result<(), Self::Error> {
        match from_tungstenite(item) {
            Some(msg) => Pin::new(&mut self.inner).start_send(msg).map_err(io_error),
            None => Ok(()),
        }
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Pin::new(&mut self.inner).poll_flush(cx).map_err(io_error)
    }

    fn poll_close(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Pin::new(&mut self.inner).poll_close(cx).map_err(io_error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_survives_both_directions() {
        let axum_msg = Message::Text(String::from(r#"{"type":"ping","timestamp":1}"#).into());
        let tung = into_tungstenite(axum_msg);
        assert_eq!(tung.to_text().unwrap(), r#"{"type":"ping","timestamp":1}"#);

        match from_tungstenite(tung) {
            Some(Message::Text(text)) => assert_eq!(text.as_str(), r#"{"type":"ping","timestamp":1}"#),
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_close_maps_to_close() {
        assert!(matches!(
            into_tungstenite(Message::Close(None)),
            tungstenite::Message::Close(None)
        ));
        assert!(matches!(
            from_tungstenite(tungstenite::Message::Close(None)),
            Some(Message::Close(None))
        ));
    }
}
