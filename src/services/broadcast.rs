//! Frame broadcaster — renders the scene and fans frames out to clients.
//!
//! DESIGN
//! ======
//! On each timer tick the node calls [`Broadcaster::on_tick`]. With no
//! clients connected the tick is a no-op: nothing is rendered or written.
//! Otherwise a copy of the scene is rendered, mirrored, JPEG-encoded and
//! framed on a blocking worker so the event loop never stalls on encoding.
//! The finished frame returns as `Event::FrameReady` and
//! [`Broadcaster::on_frame_ready`] offers it to every client queue.
//!
//! At most one render is in flight; ticks that arrive meanwhile are
//! skipped rather than queued, so a slow encoder lowers the frame rate
//! instead of building a backlog.

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::frame::{FrameBytes, FrameError, FrameLayout, encode_frame};
use crate::render::{Orientation, RenderError, SceneRenderer};
use crate::scene::Scene;
use crate::services::clients::{ClientRegistry, Delivery};
use crate::state::Event;

#[derive(Debug, thiserror::Error)]
pub enum BroadcastError {
    #[error(transparent)]
    Render(#[from] RenderError),

    #[error(transparent)]
    Frame(#[from] FrameError),

    #[error("render worker failed: {0}")]
    Worker(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    NoClients,
    /// Previous frame still rendering.
    Busy,
    Rendering,
}

pub struct Broadcaster {
    renderer: Arc<SceneRenderer>,
    layout: FrameLayout,
    in_flight: bool,
    frames_sent: u64,
}

impl Broadcaster {
    #[must_use]
    pub fn new(renderer: Arc<SceneRenderer>, layout: FrameLayout) -> Self {
        Self { renderer, layout, in_flight: false, frames_sent: 0 }
    }

    #[must_use]
    pub fn frames_sent(&self) -> u64 {
        self.frames_sent
    }

    #[cfg(test)]
    #[must_use]
    pub fn in_flight(&self) -> bool {
        self.in_flight
    }

    /// Start rendering a frame if anyone is listening.
    pub fn on_tick(&mut self, scene: &Scene, clients: &ClientRegistry, events: &mpsc::Sender<Event>) -> TickOutcome {
        if clients.is_empty() {
            return TickOutcome::NoClients;
        }
        if self.in_flight {
            debug!("broadcast: previous frame still rendering, tick skipped");
            return TickOutcome::Busy;
        }
        self.in_flight = true;

        let scene = scene.clone();
        let renderer = Arc::clone(&self.renderer);
        let layout = self.layout;
        let events = events.clone();
        tokio::spawn(async move {
            let result = tokio::task::spawn_blocking(move || render_frame(&renderer, &scene, layout))
                .await
                .unwrap_or_else(|e| Err(BroadcastError::Worker(e.to_string())));
            if events.send(Event::FrameReady(result)).await.is_err() {
                debug!("broadcast: node stopped before frame was ready");
            }
        });
        TickOutcome::Rendering
    }

    /// Offer a finished frame to every client.
    pub fn on_frame_ready(
        &mut self,
        result: Result<FrameBytes, BroadcastError>,
        clients: &mut ClientRegistry,
    ) -> Option<Delivery> {
        self.in_flight = false;
        let frame = match result {
            Ok(frame) => frame,
            Err(e) => {
                warn!(error = %e, "broadcast: frame dropped");
                return None;
            }
        };
        if clients.is_empty() {
            return None;
        }
        let delivery = clients.broadcast(&frame);
        self.frames_sent += 1;
        Some(delivery)
    }
}

/// Render, mirror, encode and frame one scene. Blocking.
///
/// # Errors
///
/// Returns [`BroadcastError`] if rendering, encoding or framing fails.
pub fn render_frame(renderer: &SceneRenderer, scene: &Scene, layout: FrameLayout) -> Result<FrameBytes, BroadcastError> {
    let jpeg = renderer.render_jpeg(scene, Orientation::Mirrored)?;
    Ok(encode_frame(&jpeg, layout)?)
}

#[cfg(test)]
#[path = "broadcast_test.rs"]
mod tests;
