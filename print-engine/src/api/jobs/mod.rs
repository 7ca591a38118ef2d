//! Print job API

mod handler;

pub use handler::{ListQuery, SubmitRequest, SubmitResponse};

use axum::{
    Router,
    routing::{get, post},
};

use crate::core::EngineState;

pub fn router() -> Router<EngineState> {
    Router::new().nest("/api/print-jobs", routes())
}

fn routes() -> Router<EngineState> {
    Router::new()
        .route("/", get(handler::list).post(handler::submit))
        .route("/{id}", get(handler::get_by_id))
        .route("/{id}/retry", post(handler::retry))
        .route("/{id}/cancel", post(handler::cancel))
}
