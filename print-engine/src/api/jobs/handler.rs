//! Print job handlers

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::core::{EngineResult, EngineState};
use crate::printing::{JobStatus, PrintJob, TargetKind};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitRequest {
    pub template_id: String,
    pub order_data: Value,
    #[serde(default = "default_target")]
    pub target_kind: TargetKind,
}

fn default_target() -> TargetKind {
    TargetKind::Receipt
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitResponse {
    pub job_id: String,
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub status: Option<JobStatus>,
}

/// POST /api/print-jobs - 202 once the job is durably queued
pub async fn submit(
    State(state): State<EngineState>,
    Json(req): Json<SubmitRequest>,
) -> EngineResult<(StatusCode, Json<SubmitResponse>)> {
    let job_id =
        state
            .service
            .submit_print_job(&req.template_id, &req.order_data, req.target_kind)?;
    Ok((StatusCode::ACCEPTED, Json(SubmitResponse { job_id })))
}

/// GET /api/print-jobs
pub async fn list(
    State(state): State<EngineState>,
    Query(query): Query<ListQuery>,
) -> EngineResult<Json<Vec<PrintJob>>> {
    Ok(Json(state.service.list_jobs(query.status)?))
}

/// GET /api/print-jobs/{id}
pub async fn get_by_id(
    State(state): State<EngineState>,
    Path(id): Path<String>,
) -> EngineResult<Json<PrintJob>> {
    Ok(Json(state.service.get_job(&id)?))
}

/// POST /api/print-jobs/{id}/retry
pub async fn retry(
    State(state): State<EngineState>,
    Path(id): Path<String>,
) -> EngineResult<Json<PrintJob>> {
    Ok(Json(state.service.retry_job(&id)?))
}

/// POST /api/print-jobs/{id}/cancel
pub async fn cancel(
    State(state): State<EngineState>,
    Path(id): Path<String>,
) -> EngineResult<Json<PrintJob>> {
    Ok(Json(state.service.cancel_job(&id)?))
}
