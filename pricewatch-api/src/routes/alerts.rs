//! Pending alert counts

use axum::{extract::State, response::Json, routing::get, Router};
use pricewatch_core::Asset;
use serde::Serialize;
use std::collections::BTreeMap;

use crate::AppState;

#[derive(Debug, Serialize)]
struct AlertCounts {
    total: usize,
    by_asset: BTreeMap<Asset, usize>,
}

async fn get_alert_counts(State(state): State<AppState>) -> Json<AlertCounts> {
    let by_asset = state.registry.counts();
    Json(AlertCounts {
        total: by_asset.values().sum(),
        by_asset,
    })
}

pub fn routes() -> Router<AppState> {
    Router::new().route("/alerts", get(get_alert_counts))
}
