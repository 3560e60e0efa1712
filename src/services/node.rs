//! Node — owns the scene, client registry and calibration queue, and runs
//! the single event loop that mutates them.
//!
//! DESIGN
//! ======
//! Events come from three places:
//! - the frame timer, polled inside [`Node::run`]
//! - the shared `mpsc` channel (acceptor, connections, HTTP, projectors)
//! - a local queue for follow-ups the node posts to itself, drained before
//!   the channel so a follow-up always runs next
//!
//! [`Node::handle`] is synchronous. Anything slow (rendering, projector
//! calibration) runs on its own task and reports back as an event.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

use crate::config::NodeConfig;
use crate::links::Projector;
use crate::render::SceneRenderer;
use crate::scene::{ItemKind, Point, Rgba, Scene};
use crate::services::broadcast::Broadcaster;
use crate::services::calibration::{Advance, TouchCalibration};
use crate::services::clients::ClientRegistry;
use crate::services::projector::{self, ProjectorTracker};
use crate::services::startup::Readiness;
use crate::services::status::StatusPublisher;
use crate::state::{EVENT_QUEUE_CAPACITY, Event, NodeHandle};

/// Demo content shown once startup completes.
const GREETING: &str = "Hello world!";
/// Greeting size in typographic points.
const GREETING_SIZE_PT: f64 = 148.0;
/// Pixels per point at the usual 96 DPI logical resolution.
const PX_PER_PT: f64 = 96.0 / 72.0;

/// Whether the loop keeps going after an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Stop,
}

pub struct Node {
    scene: Scene,
    clients: ClientRegistry,
    calibration: TouchCalibration,
    broadcaster: Broadcaster,
    projectors: ProjectorTracker,
    status: StatusPublisher,
    frame_interval: Duration,
    events_tx: mpsc::Sender<Event>,
    events_rx: mpsc::Receiver<Event>,
    local: VecDeque<Event>,
}

impl Node {
    /// Build the node and the handle everything else uses to reach it.
    #[must_use]
    pub fn new(config: &NodeConfig, renderer: Arc<SceneRenderer>) -> (Self, NodeHandle) {
        let (events_tx, events_rx) = mpsc::channel(EVENT_QUEUE_CAPACITY);
        let status = StatusPublisher::new();
        let handle = NodeHandle { events: events_tx.clone(), status: status.clone(), renderer: Arc::clone(&renderer) };
        let node = Self {
            scene: Scene::new(&config.table),
            clients: ClientRegistry::new(),
            calibration: TouchCalibration::new(config.restore_policy, config.calibration_marker_m),
            broadcaster: Broadcaster::new(renderer, config.frame_layout),
            projectors: ProjectorTracker::new(),
            status,
            frame_interval: config.frame_interval(),
            events_tx,
            events_rx,
            local: VecDeque::new(),
        };
        (node, handle)
    }

    #[cfg(test)]
    #[must_use]
    pub fn scene(&self) -> &Scene {
        &self.scene
    }

    #[cfg(test)]
    #[must_use]
    pub fn clients(&self) -> &ClientRegistry {
        &self.clients
    }

    #[cfg(test)]
    #[must_use]
    pub fn calibration(&self) -> &TouchCalibration {
        &self.calibration
    }

    #[cfg(test)]
    #[must_use]
    pub fn broadcaster(&self) -> &Broadcaster {
        &self.broadcaster
    }

    /// Wait for projectors and start any calibrations they need.
    pub async fn bring_up_projectors(&mut self, projectors: &[Arc<dyn Projector>], readiness: Readiness) {
        self.projectors = projector::bring_up(projectors, readiness, &self.status, &self.events_tx).await;
    }

    /// Add the demo greeting to the scene.
    pub fn add_demo_content(&mut self) {
        self.scene.add(
            ItemKind::Text { text: GREETING.to_string(), size_px: GREETING_SIZE_PT * PX_PER_PT },
            Point::new(0.0, 0.0),
            Rgba::WHITE,
        );
    }

    /// Run until `Shutdown` arrives.
    pub async fn run(mut self) {
        let mut ticker = tokio::time::interval(self.frame_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        info!(interval_ms = self.frame_interval.as_millis(), "node: event loop started");

        loop {
            let event = if let Some(event) = self.local.pop_front() {
                event
            } else {
                tokio::select! {
                    _ = ticker.tick() => Event::Tick,
                    event = self.events_rx.recv() => match event {
                        Some(event) => event,
                        None => break,
                    },
                }
            };
            if self.handle(event) == Flow::Stop {
                break;
            }
        }
        info!(clients = self.clients.len(), frames = self.broadcaster.frames_sent(), "node: event loop stopped");
    }

    #[cfg(test)]
    /// Process the next queued event without the timer.
    pub async fn step(&mut self) -> Option<Flow> {
        let event = match self.local.pop_front() {
            Some(event) => event,
            None => self.events_rx.recv().await?,
        };
        Some(self.handle(event))
    }

    /// Apply one event to node state.
    pub fn handle(&mut self, event: Event) -> Flow {
        match event {
            Event::Tick => {
                self.broadcaster.on_tick(&self.scene, &self.clients, &self.events_tx);
            }
            Event::FrameReady(result) => {
                if let Some(delivery) = self.broadcaster.on_frame_ready(result, &mut self.clients) {
                    if delivery.dropped > 0 || !delivery.removed.is_empty() {
                        debug!(queued = delivery.queued, dropped = delivery.dropped, removed = delivery.removed.len(), "node: frame delivered");
                    }
                }
            }
            Event::ClientConnected { id, peer, tx } => {
                // A connection that already died has a closed queue; the
                // next broadcast removes it.
                self.clients.add(id, peer, tx);
            }
            Event::ClientGone { id, reason } => {
                if !self.clients.remove(id) {
                    debug!(%id, %reason, "node: client already removed");
                }
            }
            Event::CalibrationRequested { points, reply } => {
                self.calibration.begin(&mut self.scene, points);
                self.local.push_back(Event::ShowNextCalibrationPoint);
                if reply.send(true).is_err() {
                    debug!("node: calibration requester went away");
                }
            }
            Event::ShowNextCalibrationPoint => {
                self.calibration.show_next(&mut self.scene);
            }
            Event::TouchDetected => {
                if self.calibration.touch(&mut self.scene) == Advance::Completed {
                    info!(runs = self.calibration.completed_runs(), "node: touch calibration finished");
                }
            }
            Event::ProjectorCalibrated { id, result } => {
                self.projectors.complete(&id, result, &self.status);
            }
            Event::SceneRequested { reply } => {
                if reply.send(self.scene.clone()).is_err() {
                    debug!("node: scene requester went away");
                }
            }
            Event::Shutdown => {
                info!("node: shutdown requested");
                return Flow::Stop;
            }
        }
        Flow::Continue
    }
}

#[cfg(test)]
#[path = "node_test.rs"]
mod tests;
