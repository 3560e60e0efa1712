//! Touch calibration routes.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::Json;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::services::calibration::CalibrationPoint;
use crate::state::NodeHandle;

#[derive(Debug, Deserialize)]
pub struct TouchCalibrationRequest {
    pub points: Vec<CalibrationPoint>,
}

#[derive(Debug, Serialize)]
pub struct TouchCalibrationResponse {
    pub success: bool,
}

/// `POST /touch_calibration` — hide the scene and start showing points.
///
/// Answers as soon as the node has accepted the request; the run itself
/// finishes as touches arrive.
pub async fn touch_calibration(
    State(node): State<NodeHandle>,
    Json(body): Json<TouchCalibrationRequest>,
) -> Result<Json<TouchCalibrationResponse>, StatusCode> {
    let success = node.request_calibration(body.points).await.map_err(|e| {
        warn!(error = %e, "touch_calibration: rejected");
        StatusCode::SERVICE_UNAVAILABLE
    })?;
    Ok(Json(TouchCalibrationResponse { success }))
}

/// `POST /touch_detected` — one physical touch on the table.
pub async fn touch_detected(State(node): State<NodeHandle>) -> StatusCode {
    match node.touch_detected().await {
        Ok(()) => StatusCode::ACCEPTED,
        Err(e) => {
            warn!(error = %e, "touch_detected: dropped");
            StatusCode::SERVICE_UNAVAILABLE
        }
    }
}
