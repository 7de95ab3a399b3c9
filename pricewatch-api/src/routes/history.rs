//! Recent price history

use axum::{
    extract::{Query, State},
    response::Json,
    routing::get,
    Router,
};
use pricewatch_core::PriceSnapshot;
use serde::{Deserialize, Serialize};

use crate::AppState;

#[derive(Debug, Deserialize)]
struct HistoryQuery {
    /// Max snapshots to return (defaults to the whole buffer)
    limit: Option<usize>,
}

#[derive(Debug, Serialize)]
struct HistoryResponse {
    count: usize,
    /// Newest first
    snapshots: Vec<PriceSnapshot>,
}

async fn get_history(
    State(state): State<AppState>,
    Query(query): Query<HistoryQuery>,
) -> Json<HistoryResponse> {
    let snapshots = match query.limit {
        Some(limit) => state.history.recent(limit),
        None => state.history.all(),
    };

    Json(HistoryResponse {
        count: snapshots.len(),
        snapshots,
    })
}

pub fn routes() -> Router<AppState> {
    Router::new().route("/history", get(get_history))
}
