//! Read-only status routes.

use axum::extract::State;
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Json};
use serde::Serialize;
use tracing::warn;

use crate::render::Orientation;
use crate::state::NodeHandle;

#[derive(Debug, Serialize)]
pub struct ProjectorsCalibrated {
    /// `None` until projector bring-up has published a value.
    pub calibrated: Option<bool>,
}

/// `GET /projectors_calibrated` — latest latched projector flag.
pub async fn projectors_calibrated(State(node): State<NodeHandle>) -> Json<ProjectorsCalibrated> {
    Json(ProjectorsCalibrated { calibrated: node.status.current() })
}

/// `GET /scene.jpg` — render the current scene upright, for debugging
/// without a projector attached.
pub async fn scene_jpeg(State(node): State<NodeHandle>) -> Result<impl IntoResponse, StatusCode> {
    let scene = node.scene_snapshot().await.map_err(|_| StatusCode::SERVICE_UNAVAILABLE)?;
    let renderer = node.renderer.clone();
    let jpeg = tokio::task::spawn_blocking(move || renderer.render_jpeg(&scene, Orientation::TopDown))
        .await
        .map_err(|e| {
            warn!(error = %e, "scene.jpg: render worker failed");
            StatusCode::INTERNAL_SERVER_ERROR
        })?
        .map_err(|e| {
            warn!(error = %e, "scene.jpg: render failed");
            StatusCode::INTERNAL_SERVER_ERROR
        })?;
    Ok(([(header::CONTENT_TYPE, "image/jpeg")], jpeg))
}
