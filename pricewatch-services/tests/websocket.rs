//! WebSocket session tests over a real localhost connection

use futures_util::{SinkExt, StreamExt};
use pricewatch_core::{Asset, ErrorCode, PriceSnapshot, ServerMessage};
use pricewatch_services::{
    AlertMatcher, AlertRegistry, Bridge, HistoryStore, InMemoryBus, PriceWorker, Publisher,
    SessionManager, SessionTransport, WebSocketConfig, WebSocketState, WorkerConfig,
};
use pricewatch_feed::{FeedError, PriceFeed};
use rust_decimal_macros::dec;
use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Feed that always quotes bitcoin at the same price
struct FixedFeed;

#[async_trait::async_trait]
impl PriceFeed for FixedFeed {
    async fn fetch_prices(&self, _assets: &[Asset]) -> Result<PriceSnapshot, FeedError> {
        let mut prices = BTreeMap::new();
        prices.insert(Asset::new("bitcoin"), dec!(96000));
        Ok(PriceSnapshot::now(prices))
    }
}

/// Accept WebSocket connections on an ephemeral port
async fn serve(state: WebSocketState) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            let state = state.clone();
            tokio::spawn(async move {
                if let Ok(socket) = tokio_tungstenite::accept_async(stream).await {
                    state.handle_connection(socket).await;
                }
            });
        }
    });

    addr
}

async fn recv(client: &mut Client) -> ServerMessage {
    loop {
        let frame = tokio::time::timeout(Duration::from_secs(2), client.next())
            .await
            .expect("timed out waiting for frame")
            .expect("connection closed")
            .expect("websocket error");
        if let Message::Text(text) = frame {
            return serde_json::from_str(&text).expect("valid server message");
        }
    }
}

async fn send(client: &mut Client, json: &str) {
    client.send(Message::Text(json.into())).await.unwrap();
}

fn state(registry: Arc<AlertRegistry>, history: Arc<HistoryStore>) -> WebSocketState {
    WebSocketState::new(
        Arc::new(SessionManager::new()),
        registry,
        history,
        WebSocketConfig::default(),
    )
}

#[tokio::test]
async fn greets_with_session_id_and_history() {
    let history = Arc::new(HistoryStore::default());
    history.append(PriceSnapshot::now(BTreeMap::from([(
        Asset::new("bitcoin"),
        dec!(95500),
    )])));
    let addr = serve(state(Arc::new(AlertRegistry::new()), history)).await;

    let (mut client, _) = connect_async(format!("ws://{}", addr)).await.unwrap();

    assert!(matches!(recv(&mut client).await, ServerMessage::Connected { .. }));
    match recv(&mut client).await {
        ServerMessage::History { snapshots } => {
            assert_eq!(snapshots.len(), 1);
            assert_eq!(snapshots[0].price_of(&Asset::new("bitcoin")), Some(dec!(95500)));
        }
        other => panic!("expected history, got {:?}", other),
    }
}

#[tokio::test]
async fn set_alert_then_receive_popup() {
    let bus = Arc::new(InMemoryBus::new());
    let registry = Arc::new(AlertRegistry::new());
    let history = Arc::new(HistoryStore::default());
    let ws = state(registry.clone(), history.clone());

    let bridge = Arc::new(Bridge::new(bus.clone(), ws.sessions.clone()));
    let _forwarder = Arc::clone(&bridge).start().await.unwrap();
    let addr = serve(ws.clone()).await;

    let (mut client, _) = connect_async(format!("ws://{}", addr)).await.unwrap();
    let session_id = match recv(&mut client).await {
        ServerMessage::Connected { session_id } => session_id,
        other => panic!("expected connected, got {:?}", other),
    };
    assert!(matches!(recv(&mut client).await, ServerMessage::History { .. }));

    send(&mut client, r#"{"type":"set_alert","target_price":95000}"#).await;
    match recv(&mut client).await {
        ServerMessage::AlertConfirmed { message, .. } => {
            assert_eq!(message, "Alert set for $95000");
        }
        other => panic!("expected confirmation, got {:?}", other),
    }
    assert_eq!(
        registry.target_of(&Asset::new("bitcoin"), &session_id),
        Some(dec!(95000))
    );

    let worker = PriceWorker::new(
        WorkerConfig::default(),
        Arc::new(FixedFeed),
        history,
        registry.clone(),
        AlertMatcher::default(),
        Publisher::new(bus),
    );
    worker.run_cycle().await;

    match recv(&mut client).await {
        ServerMessage::AlertPopup { message, .. } => {
            assert_eq!(message, "bitcoin has reached $96000!");
        }
        other => panic!("expected alert popup, got {:?}", other),
    }
    assert!(matches!(recv(&mut client).await, ServerMessage::PriceTick { .. }));
    assert!(registry.is_empty());
}

#[tokio::test]
async fn rejects_bad_input_without_dropping_connection() {
    let addr = serve(state(
        Arc::new(AlertRegistry::new()),
        Arc::new(HistoryStore::default()),
    ))
    .await;
    let (mut client, _) = connect_async(format!("ws://{}", addr)).await.unwrap();
    recv(&mut client).await;
    recv(&mut client).await;

    send(&mut client, "not json").await;
    assert!(matches!(
        recv(&mut client).await,
        ServerMessage::Error {
            code: ErrorCode::InvalidMessage,
            ..
        }
    ));

    send(&mut client, r#"{"type":"set_alert","target_price":1,"asset":"dogecoin"}"#).await;
    assert!(matches!(
        recv(&mut client).await,
        ServerMessage::Error {
            code: ErrorCode::UnknownAsset,
            ..
        }
    ));

    send(&mut client, r#"{"type":"ping","timestamp":42}"#).await;
    assert!(matches!(
        recv(&mut client).await,
        ServerMessage::Pong {
            client_timestamp: 42,
            ..
        }
    ));
}

#[tokio::test]
async fn disconnect_purges_alerts() {
    let registry = Arc::new(AlertRegistry::new());
    let ws = state(registry.clone(), Arc::new(HistoryStore::default()));
    let addr = serve(ws.clone()).await;

    let (mut client, _) = connect_async(format!("ws://{}", addr)).await.unwrap();
    recv(&mut client).await;
    recv(&mut client).await;
    send(&mut client, r#"{"type":"set_alert","target_price":95000}"#).await;
    recv(&mut client).await;
    assert_eq!(registry.total(), 1);

    client.close(None).await.unwrap();

    for _ in 0..50 {
        if registry.is_empty() && ws.sessions.session_count() == 0 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert!(registry.is_empty());
    assert_eq!(ws.sessions.session_count(), 0);
}
