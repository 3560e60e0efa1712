//! Links — the node's view of its peers (touch table, projector nodes).
//!
//! DESIGN
//! ======
//! Startup and projector bring-up only see the `TouchTable` and `Projector`
//! traits. Production uses the HTTP clients in [`http`]; tests plug in
//! in-memory fakes. Peer protocols beyond these calls belong to the peers.

pub mod http;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

// =============================================================================
// ERROR
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum LinkError {
    /// The request never got a response (refused, reset, timed out).
    #[error("request to {peer} failed: {message}")]
    Request { peer: String, message: String },

    #[error("{peer} responded with status {status}")]
    Response { peer: String, status: u16 },

    #[error("{peer} sent an unreadable body: {message}")]
    Parse { peer: String, message: String },

    #[error("HTTP client build failed: {0}")]
    HttpClientBuild(String),
}

impl LinkError {
    /// Whether polling again may succeed.
    #[must_use]
    pub fn retryable(&self) -> bool {
        matches!(self, Self::Request { .. } | Self::Response { status: 404 | 429 | 500..=599, .. })
    }
}

// =============================================================================
// WIRE TYPES
// =============================================================================

/// Body of the touch table's `calibrated` message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableCalibrated {
    pub calibrated: bool,
}

/// A projector node's self-reported status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectorStatus {
    pub id: String,
    pub calibrated: bool,
}

/// Result body of a projector calibration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectorCalibration {
    pub calibrated: bool,
}

// =============================================================================
// TRAITS
// =============================================================================

#[async_trait]
pub trait TouchTable: Send + Sync {
    /// Latest `calibrated` message from the table.
    async fn calibrated(&self) -> Result<bool, LinkError>;

    /// Succeeds once the table's calibrate service accepts calls.
    async fn calibrate_service_ready(&self) -> Result<(), LinkError>;

    /// Run the table's calibration; returns when it has finished.
    async fn calibrate(&self) -> Result<(), LinkError>;
}

#[async_trait]
pub trait Projector: Send + Sync {
    /// Stable label used in logs and completion events.
    fn id(&self) -> &str;

    /// Fails while the projector node is unreachable.
    async fn status(&self) -> Result<ProjectorStatus, LinkError>;

    /// Run the projector's calibration; returns whether it succeeded.
    async fn calibrate(&self) -> Result<bool, LinkError>;
}
