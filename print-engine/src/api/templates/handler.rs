//! Template handlers

use axum::{
    Json,
    extract::{Path, State},
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::core::{EngineResult, EngineState};
use crate::printing::TargetKind;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreviewRequest {
    pub order_data: Value,
    #[serde(default = "default_target")]
    pub target_kind: TargetKind,
}

fn default_target() -> TargetKind {
    TargetKind::Receipt
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PreviewResponse {
    pub lines: Vec<String>,
}

/// GET /api/templates
pub async fn list(State(state): State<EngineState>) -> Json<Vec<String>> {
    Json(state.service.catalog().ids())
}

/// POST /api/templates/{id}/preview
pub async fn preview(
    State(state): State<EngineState>,
    Path(id): Path<String>,
    Json(req): Json<PreviewRequest>,
) -> EngineResult<Json<PreviewResponse>> {
    let lines = state
        .service
        .preview(&id, &req.order_data, req.target_kind)?;
    Ok(Json(PreviewResponse { lines }))
}
