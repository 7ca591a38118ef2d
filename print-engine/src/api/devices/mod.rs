//! Device API

use axum::{Json, Router, extract::State, routing::get};

use crate::core::EngineState;
use crate::printing::Device;

pub fn router() -> Router<EngineState> {
    Router::new().route("/api/devices", get(list))
}

/// GET /api/devices - cached connectivity, no probing
pub async fn list(State(state): State<EngineState>) -> Json<Vec<Device>> {
    Json(state.service.list_devices())
}
