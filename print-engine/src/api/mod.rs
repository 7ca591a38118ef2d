//! HTTP routes over [`EngineState`]
//!
//! The daemon owns the queue database, so this is how a POS process submits
//! work and how an operator inspects it.
//!
//! | Path | Method | Purpose |
//! |------|--------|---------|
//! | /health | GET | liveness plus queue counts |
//! | /api/print-jobs | POST | render and enqueue an order |
//! | /api/print-jobs | GET | list jobs, `?status=FAILED` to filter |
//! | /api/print-jobs/{id} | GET | one job |
//! | /api/print-jobs/{id}/retry | POST | requeue a failed job |
//! | /api/print-jobs/{id}/cancel | POST | cancel a pending job |
//! | /api/devices | GET | devices and last known connectivity |
//! | /api/templates | GET | loaded template ids |
//! | /api/templates/{id}/preview | POST | plain-text render, nothing queued |

pub mod devices;
pub mod health;
pub mod jobs;
pub mod templates;

use axum::{Router, extract::Request, middleware, middleware::Next, response::Response};

use crate::core::EngineState;

async fn log_request(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();

    let response = next.run(request).await;

    tracing::info!(target: "http_access", "{} {} {}", method, uri, response.status());
    response
}

/// Build the router bound to `state`
pub fn build_app(state: EngineState) -> Router {
    Router::<EngineState>::new()
        .merge(health::router())
        .merge(jobs::router())
        .merge(devices::router())
        .merge(templates::router())
        .with_state(state)
        .layer(middleware::from_fn(log_request))
}
