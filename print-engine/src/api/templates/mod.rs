//! Template API

mod handler;

pub use handler::{PreviewRequest, PreviewResponse};

use axum::{
    Router,
    routing::{get, post},
};

use crate::core::EngineState;

pub fn router() -> Router<EngineState> {
    Router::new().nest("/api/templates", routes())
}

fn routes() -> Router<EngineState> {
    Router::new()
        .route("/", get(handler::list))
        .route("/{id}/preview", post(handler::preview))
}
