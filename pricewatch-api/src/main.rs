//! Pricewatch API Server
//!
//! Polls asset prices, fires price alerts and streams both to browser
//! clients over WebSocket.

mod routes;

use anyhow::Context;
use axum::{
    http::{header, Method},
    Router,
};
use pricewatch_feed::CoinGeckoClient;
use pricewatch_services::{
    AlertMatcher, AlertRegistry, Bridge, HistoryStore, InMemoryBus, PriceWorker,
    PricewatchConfig, Publisher, SessionManager, WebSocketState,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub ws_state: Arc<WebSocketState>,
    pub worker: Arc<PriceWorker>,
    pub bridge: Arc<Bridge>,
    pub history: Arc<HistoryStore>,
    pub registry: Arc<AlertRegistry>,
}

/// Build the shared components without starting any background task
fn build_state(config: &PricewatchConfig) -> anyhow::Result<AppState> {
    let feed = CoinGeckoClient::with_base_url(config.api_url.clone(), config.vs_currency.clone())
        .context("Failed to create price feed client")?;

    let bus = Arc::new(InMemoryBus::new());
    let history = Arc::new(HistoryStore::new(config.history_capacity));
    let registry = Arc::new(AlertRegistry::new());
    let sessions = Arc::new(SessionManager::new());

    let worker = Arc::new(PriceWorker::new(
        config.worker_config(),
        Arc::new(feed),
        history.clone(),
        registry.clone(),
        AlertMatcher::new(config.trigger_direction),
        Publisher::new(bus.clone()),
    ));

    let bridge = Arc::new(Bridge::new(bus, sessions.clone()));

    let ws_state = Arc::new(WebSocketState::new(
        sessions,
        registry.clone(),
        history.clone(),
        config.websocket_config(),
    ));

    Ok(AppState {
        ws_state,
        worker,
        bridge,
        history,
        registry,
    })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env.local file
    if let Err(e) = dotenvy::from_filename(".env.local") {
        // Not an error if the file doesn't exist
        if !matches!(e, dotenvy::Error::Io(_)) {
            eprintln!("Warning: Failed to load .env.local: {}", e);
        }
    }

    // Initialize logging
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                EnvFilter::new("info,pricewatch_api=debug,pricewatch_services=debug")
            }),
        )
        .init();

    info!("Starting Pricewatch API");

    let config = PricewatchConfig::from_env().context("Invalid configuration")?;
    info!(
        "Tracking {} in {} (trigger direction: {})",
        config
            .assets
            .iter()
            .map(|a| a.as_str())
            .collect::<Vec<_>>()
            .join(","),
        config.vs_currency,
        config.trigger_direction
    );

    let state = build_state(&config)?;

    // The session layer must not serve clients without its bus subscription
    Arc::clone(&state.bridge)
        .start()
        .await
        .context("Failed to subscribe bridge to the message bus")?;

    // Start polling in background
    Arc::clone(&state.worker).spawn();

    // Configure CORS for frontend
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE]);

    // Build router
    let app = Router::new()
        .nest("/api", routes::api_routes())
        .merge(routes::ws_routes())
        .layer(cors)
        .with_state(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server_port));
    info!("Server listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
