//! Router assembly.
//!
//! SYSTEM CONTEXT
//! ==============
//! The touch table and operators reach the node over plain HTTP: the
//! calibration request and touch events come in here, the latched
//! projector flag and a debug snapshot of the scene go out. Every handler
//! translates a request into a node event through [`NodeHandle`].

pub mod calibration;
pub mod status;

use axum::Router;
use axum::http::StatusCode;
use axum::routing::{get, post};
use tower_http::trace::TraceLayer;

use crate::state::NodeHandle;

/// Build the node's HTTP router.
pub fn app(handle: NodeHandle) -> Router {
    Router::new()
        .route("/touch_calibration", post(calibration::touch_calibration))
        .route("/touch_detected", post(calibration::touch_detected))
        .route("/projectors_calibrated", get(status::projectors_calibrated))
        .route("/scene.jpg", get(status::scene_jpeg))
        .route("/healthz", get(healthz))
        .layer(TraceLayer::new_for_http())
        .with_state(handle)
}

async fn healthz() -> StatusCode {
    StatusCode::OK
}

#[cfg(test)]
#[path = "mod_test.rs"]
mod tests;
