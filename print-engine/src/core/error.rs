use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

use crate::printing::{JobStatus, QueueStoreError};
use crate::template::TemplateError;

/// Errors surfaced to callers of the print engine
///
/// Delivery failures never appear here: once a job is queued they live in
/// the job's status and `last_error`.
#[derive(Error, Debug)]
pub enum PrintEngineError {
    #[error(transparent)]
    TemplateInvalid(#[from] TemplateError),

    #[error("Template not found: {0}")]
    TemplateNotFound(String),

    #[error("Print queue store unavailable: {0}")]
    QueueStoreUnavailable(String),

    #[error("Print job not found: {0}")]
    JobNotFound(String),

    #[error("Print job {id}: cannot move from {from} to {to}")]
    InvalidTransition {
        id: String,
        from: JobStatus,
        to: JobStatus,
    },

    #[error("No device configured for {0}")]
    DeviceNotFound(String),

    #[error("Invalid device configuration: {0}")]
    DeviceConfig(String),
}

impl From<QueueStoreError> for PrintEngineError {
    fn from(err: QueueStoreError) -> Self {
        match err {
            QueueStoreError::JobNotFound(id) => PrintEngineError::JobNotFound(id),
            QueueStoreError::InvalidTransition { id, from, to } => {
                PrintEngineError::InvalidTransition { id, from, to }
            }
            other => PrintEngineError::QueueStoreUnavailable(other.to_string()),
        }
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    message: String,
}

impl IntoResponse for PrintEngineError {
    fn into_response(self) -> Response {
        let (status, error_type) = match &self {
            PrintEngineError::TemplateInvalid(_) => {
                (StatusCode::UNPROCESSABLE_ENTITY, "template_invalid")
            }
            PrintEngineError::TemplateNotFound(_) => (StatusCode::NOT_FOUND, "template_not_found"),
            PrintEngineError::JobNotFound(_) => (StatusCode::NOT_FOUND, "job_not_found"),
            PrintEngineError::InvalidTransition { .. } => {
                (StatusCode::CONFLICT, "invalid_transition")
            }
            PrintEngineError::DeviceNotFound(_) => (StatusCode::NOT_FOUND, "device_not_found"),
            PrintEngineError::QueueStoreUnavailable(_) | PrintEngineError::DeviceConfig(_) => {
                tracing::error!(error = %self, "Print engine request failed");
                (StatusCode::SERVICE_UNAVAILABLE, "unavailable")
            }
        };

        let body = ErrorResponse {
            error: error_type.to_string(),
            message: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

pub type EngineResult<T> = std::result::Result<T, PrintEngineError>;
