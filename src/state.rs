//! Shared node handle and the events that drive the node.
//!
//! DESIGN
//! ======
//! All mutable state (scene, client registry, calibration queue) is owned
//! by the node task. Everything else (timer, TCP acceptor, connection
//! tasks, HTTP handlers, projector calibrations) holds a cloned
//! `NodeHandle` and talks to the node by sending `Event`s. Requests that
//! need an answer carry a `oneshot` reply sender.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use uuid::Uuid;

use crate::frame::FrameBytes;
use crate::render::SceneRenderer;
use crate::scene::Scene;
use crate::services::broadcast::BroadcastError;
use crate::services::calibration::CalibrationPoint;
use crate::services::status::StatusPublisher;

/// Capacity of the node's inbound event channel.
pub const EVENT_QUEUE_CAPACITY: usize = 256;

// =============================================================================
// EVENTS
// =============================================================================

/// Why a connection task stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GoneReason {
    /// Peer closed its side of the stream.
    Closed,
    WriteFailed(String),
    ReadFailed(String),
}

impl std::fmt::Display for GoneReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Closed => write!(f, "closed by peer"),
            Self::WriteFailed(e) => write!(f, "write failed: {e}"),
            Self::ReadFailed(e) => write!(f, "read failed: {e}"),
        }
    }
}

pub enum Event {
    /// Frame timer fired.
    Tick,
    /// A frame rendered off the event loop is ready to broadcast.
    FrameReady(Result<FrameBytes, BroadcastError>),
    ClientConnected { id: Uuid, peer: SocketAddr, tx: mpsc::Sender<FrameBytes> },
    ClientGone { id: Uuid, reason: GoneReason },
    /// Inbound touch calibration request. Replies `true` once accepted.
    CalibrationRequested { points: Vec<CalibrationPoint>, reply: oneshot::Sender<bool> },
    ShowNextCalibrationPoint,
    TouchDetected,
    ProjectorCalibrated { id: String, result: Result<bool, String> },
    /// Copy of the current scene, for the debug snapshot endpoint.
    SceneRequested { reply: oneshot::Sender<Scene> },
    Shutdown,
}

impl std::fmt::Debug for Event {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Tick => write!(f, "Tick"),
            Self::FrameReady(r) => write!(f, "FrameReady(ok={})", r.is_ok()),
            Self::ClientConnected { id, peer, .. } => write!(f, "ClientConnected({id}, {peer})"),
            Self::ClientGone { id, reason } => write!(f, "ClientGone({id}, {reason})"),
            Self::CalibrationRequested { points, .. } => write!(f, "CalibrationRequested({} points)", points.len()),
            Self::ShowNextCalibrationPoint => write!(f, "ShowNextCalibrationPoint"),
            Self::TouchDetected => write!(f, "TouchDetected"),
            Self::ProjectorCalibrated { id, result } => write!(f, "ProjectorCalibrated({id}, {result:?})"),
            Self::SceneRequested { .. } => write!(f, "SceneRequested"),
            Self::Shutdown => write!(f, "Shutdown"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
#[error("node event loop is not running")]
pub struct NodeGone;

// =============================================================================
// NODE HANDLE
// =============================================================================

/// Cloneable handle to the running node, injected into Axum handlers via
/// the `State` extractor.
#[derive(Clone)]
pub struct NodeHandle {
    pub events: mpsc::Sender<Event>,
    pub status: StatusPublisher,
    pub renderer: Arc<SceneRenderer>,
}

impl NodeHandle {
    /// Submit a calibration request and wait for the node to accept it.
    ///
    /// # Errors
    ///
    /// Returns [`NodeGone`] if the node loop has stopped.
    pub async fn request_calibration(&self, points: Vec<CalibrationPoint>) -> Result<bool, NodeGone> {
        let (reply, rx) = oneshot::channel();
        self.events
            .send(Event::CalibrationRequested { points, reply })
            .await
            .map_err(|_| NodeGone)?;
        rx.await.map_err(|_| NodeGone)
    }

    /// # Errors
    ///
    /// Returns [`NodeGone`] if the node loop has stopped.
    pub async fn touch_detected(&self) -> Result<(), NodeGone> {
        self.events.send(Event::TouchDetected).await.map_err(|_| NodeGone)
    }

    /// # Errors
    ///
    /// Returns [`NodeGone`] if the node loop has stopped.
    pub async fn scene_snapshot(&self) -> Result<Scene, NodeGone> {
        let (reply, rx) = oneshot::channel();
        self.events
            .send(Event::SceneRequested { reply })
            .await
            .map_err(|_| NodeGone)?;
        rx.await.map_err(|_| NodeGone)
    }

    /// Ask the node loop to stop. A stopped loop is not an error here.
    pub async fn shutdown(&self) {
        if self.events.send(Event::Shutdown).await.is_err() {
            tracing::debug!("node: shutdown requested after loop exit");
        }
    }
}

#[cfg(test)]
#[path = "state_test.rs"]
mod tests;
