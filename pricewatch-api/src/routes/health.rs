//! Health check endpoints

use axum::{extract::State, http::StatusCode, response::Json, routing::get, Router};
use pricewatch_services::{BridgeState, SessionTransport, WorkerHealth};
use serde::Serialize;

use crate::AppState;

/// Health check response
#[derive(Debug, Serialize)]
struct HealthResponse {
    status: String,
    worker: WorkerHealth,
    bridge: BridgeState,
    sessions: usize,
    alerts: usize,
}

/// Health check handler
///
/// Degraded while the worker has not completed a cycle recently or the
/// bridge is not forwarding bus traffic.
async fn health_check(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let worker = state.worker.health();
    let bridge = state.bridge.state();
    let healthy = !worker.is_stale && bridge == BridgeState::Active;

    let response = HealthResponse {
        status: if healthy { "healthy" } else { "degraded" }.to_string(),
        worker,
        bridge,
        sessions: state.ws_state.sessions.session_count(),
        alerts: state.registry.total(),
    };

    let code = if healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (code, Json(response))
}

/// Simple liveness check (always returns OK if server is running)
async fn liveness() -> &'static str {
    "OK"
}

/// Create health routes
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health_check))
        .route("/health/live", get(liveness))
}
