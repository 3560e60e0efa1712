//! Projector bring-up.
//!
//! DESIGN
//! ======
//! At startup each configured projector is waited for (bounded), then
//! either logged as calibrated or sent off to calibrate on a spawned task.
//! Completions come back to the node as `Event::ProjectorCalibrated`.
//!
//! PUBLISHING
//! ==========
//! `projectors_calibrated = false` is published as soon as any projector
//! needs calibration. Once nothing is pending, the conjunction of all
//! results is published. If nothing needed calibration that happens
//! during bring-up itself.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{error, info, warn};

use crate::links::Projector;
use crate::services::startup::{Readiness, wait_ready};
use crate::services::status::StatusPublisher;
use crate::state::Event;

/// Tracks per-projector calibration results and what is still pending.
#[derive(Debug, Default)]
pub struct ProjectorTracker {
    results: BTreeMap<String, bool>,
    pending: BTreeSet<String>,
}

impl ProjectorTracker {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, id: &str, calibrated: bool) {
        self.pending.remove(id);
        self.results.insert(id.to_string(), calibrated);
    }

    pub fn mark_pending(&mut self, id: &str) {
        self.pending.insert(id.to_string());
    }

    #[must_use]
    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    #[must_use]
    pub fn all_calibrated(&self) -> bool {
        self.results.values().all(|ok| *ok)
    }

    /// Record a finished calibration and publish if nothing is left pending.
    pub fn complete(&mut self, id: &str, result: Result<bool, String>, status: &StatusPublisher) {
        let calibrated = match result {
            Ok(calibrated) => {
                info!(projector = id, calibrated, "projector: calibration finished");
                calibrated
            }
            Err(e) => {
                error!(projector = id, error = %e, "projector: calibration failed");
                false
            }
        };
        if !self.pending.contains(id) {
            warn!(projector = id, "projector: completion for projector that was not calibrating");
        }
        self.record(id, calibrated);
        if !self.has_pending() {
            status.publish(self.all_calibrated());
        }
    }
}

/// Wait for every projector and start calibrations where needed.
///
/// Unreachable projectors are logged and counted as not calibrated.
pub async fn bring_up(
    projectors: &[Arc<dyn Projector>],
    readiness: Readiness,
    status: &StatusPublisher,
    events: &mpsc::Sender<Event>,
) -> ProjectorTracker {
    let mut tracker = ProjectorTracker::new();
    info!(count = projectors.len(), "projector: waiting for projector nodes");

    for projector in projectors {
        let id = projector.id().to_string();
        let reported = match wait_ready(&format!("projector {id}"), readiness, || projector.status()).await {
            Ok(reported) => reported,
            Err(e) => {
                error!(projector = %id, error = %e, "projector: unavailable");
                tracker.record(&id, false);
                continue;
            }
        };

        if reported.calibrated {
            info!(projector = %id, reported_id = %reported.id, "projector: already calibrated");
            tracker.record(&id, true);
            continue;
        }

        info!(projector = %id, reported_id = %reported.id, "projector: starting calibration");
        status.publish(false);
        tracker.mark_pending(&id);
        spawn_calibration(Arc::clone(projector), events.clone());
    }

    if !tracker.has_pending() {
        status.publish(tracker.all_calibrated());
    }
    tracker
}

fn spawn_calibration(projector: Arc<dyn Projector>, events: mpsc::Sender<Event>) {
    tokio::spawn(async move {
        let id = projector.id().to_string();
        let result = projector.calibrate().await.map_err(|e| e.to_string());
        if events.send(Event::ProjectorCalibrated { id, result }).await.is_err() {
            warn!("projector: node stopped before calibration finished");
        }
    });
}

#[cfg(test)]
#[path = "projector_test.rs"]
mod tests;
