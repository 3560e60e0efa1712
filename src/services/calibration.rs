//! Touch calibration handshake.
//!
//! DESIGN
//! ======
//! The touch table asks the node to show a sequence of points; each
//! physical touch advances to the next one. The queue drains front-first.
//!
//! STATES
//! ======
//! `Idle` → `CollectingPoints` (request accepted, items hidden, touches
//! subscribed) → `AwaitingTouches` (first point shown) → `Idle`.
//!
//! Whichever event finds the queue empty (the initial show or a touch)
//! takes the single completion path: remove the marker, restore item
//! visibility per `RestorePolicy`, drop the touch subscription. Completion
//! therefore fires exactly once per run.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::scene::{ItemId, ItemKind, Rgba, Scene, VisibilitySnapshot};

/// What happens to item visibility when calibration completes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestorePolicy {
    /// Every item becomes visible, including ones hidden before calibration.
    ShowAll,
    /// Each item gets back the visibility it had before calibration.
    Previous,
}

/// A calibration target on the table, in meters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CalibrationPoint {
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    CollectingPoints,
    AwaitingTouches,
}

/// Result of consuming one event.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Advance {
    /// Marker now sits on this point.
    Shown(CalibrationPoint),
    /// Queue drained; visibility restored.
    Completed,
    /// Event arrived while no calibration was running.
    Ignored,
}

pub struct TouchCalibration {
    phase: Phase,
    pending: VecDeque<CalibrationPoint>,
    marker: Option<ItemId>,
    snapshot: Option<VisibilitySnapshot>,
    policy: RestorePolicy,
    marker_size_m: f64,
    completed_runs: u64,
}

impl TouchCalibration {
    #[must_use]
    pub fn new(policy: RestorePolicy, marker_size_m: f64) -> Self {
        Self {
            phase: Phase::Idle,
            pending: VecDeque::new(),
            marker: None,
            snapshot: None,
            policy,
            marker_size_m,
            completed_runs: 0,
        }
    }

    #[cfg(test)]
    #[must_use]
    pub fn phase(&self) -> Phase {
        self.phase
    }

    #[cfg(test)]
    #[must_use]
    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    #[cfg(test)]
    #[must_use]
    pub fn marker(&self) -> Option<ItemId> {
        self.marker
    }

    /// Touch events are only consumed while a run is active.
    #[must_use]
    pub fn is_subscribed(&self) -> bool {
        self.phase != Phase::Idle
    }

    #[must_use]
    pub fn completed_runs(&self) -> u64 {
        self.completed_runs
    }

    /// Accept a calibration request: hide the scene and queue the points.
    ///
    /// A request during an active run replaces the queue but keeps the
    /// first visibility snapshot and marker.
    pub fn begin(&mut self, scene: &mut Scene, points: Vec<CalibrationPoint>) {
        if self.snapshot.is_none() {
            self.snapshot = Some(scene.hide_all());
        } else {
            debug!(discarded = self.pending.len(), "calibration: restarted with new points");
        }
        self.pending = points.into();
        self.phase = Phase::CollectingPoints;
        info!(points = self.pending.len(), "calibration: started, touch events subscribed");
    }

    /// Show the first queued point (internal follow-up to `begin`).
    pub fn show_next(&mut self, scene: &mut Scene) -> Advance {
        if self.phase != Phase::CollectingPoints {
            return Advance::Ignored;
        }
        self.advance(scene)
    }

    /// A touch was detected on the table.
    pub fn touch(&mut self, scene: &mut Scene) -> Advance {
        if !self.is_subscribed() {
            debug!("calibration: touch ignored, not calibrating");
            return Advance::Ignored;
        }
        self.advance(scene)
    }

    fn advance(&mut self, scene: &mut Scene) -> Advance {
        let Some(point) = self.pending.pop_front() else {
            return self.complete(scene);
        };
        let pos = scene.meters_to_px(point.x, point.y);
        let moved = self.marker.is_some_and(|id| scene.set_pos(id, pos));
        if !moved {
            let size = self.marker_size_m * scene.pixels_per_meter();
            self.marker = Some(scene.add(ItemKind::Ellipse { width: size, height: size }, pos, Rgba::WHITE));
        }
        self.phase = Phase::AwaitingTouches;
        debug!(x = point.x, y = point.y, remaining = self.pending.len(), "calibration: showing point");
        Advance::Shown(point)
    }

    fn complete(&mut self, scene: &mut Scene) -> Advance {
        if let Some(marker) = self.marker.take() {
            scene.remove(marker);
        }
        let snapshot = self.snapshot.take().unwrap_or_default();
        match self.policy {
            RestorePolicy::ShowAll => scene.show_all(),
            RestorePolicy::Previous => scene.restore_visibility(&snapshot),
        }
        self.phase = Phase::Idle;
        self.completed_runs += 1;
        info!(policy = ?self.policy, "calibration: completed, touch events unsubscribed");
        Advance::Completed
    }
}

#[cfg(test)]
#[path = "calibration_test.rs"]
mod tests;
