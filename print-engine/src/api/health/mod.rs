//! Health check

use axum::{Json, Router, extract::State, routing::get};
use serde::Serialize;

use crate::core::{EngineResult, EngineState};
use crate::printing::QueueStats;

pub fn router() -> Router<EngineState> {
    Router::new().route("/health", get(health))
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    status: &'static str,
    version: &'static str,
    queue: QueueStats,
    devices_online: usize,
    devices_total: usize,
}

/// Fails with 503 when the queue cannot be read
pub async fn health(State(state): State<EngineState>) -> EngineResult<Json<HealthResponse>> {
    let queue = state.store.stats()?;
    let devices = state.registry.list();
    Ok(Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        queue,
        devices_online: devices.iter().filter(|d| d.last_known_connected).count(),
        devices_total: devices.len(),
    }))
}
