//! Startup readiness checks.
//!
//! DESIGN
//! ======
//! Every startup wait is a poll with an upper bound: probe, sleep
//! `poll`, probe again, until the probe succeeds or `timeout` elapses.
//! An unreachable dependency is reported as `StartupError::Timeout`
//! instead of stalling the process forever.
//!
//! SEQUENCE
//! ========
//! 1. Wait for the touch table's `calibrated` message.
//! 2. (node) bind scene listener, bring projectors up, add scene content.
//! 3. If the table was not calibrated, wait for its calibrate service and
//!    run it.

use std::future::Future;
use std::time::Duration;

use tracing::{debug, info};

use crate::links::{LinkError, TouchTable};

#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error("timed out after {waited:?} waiting for {what}")]
    Timeout { what: String, waited: Duration },

    #[error("{what} failed: {source}")]
    Link { what: String, source: LinkError },
}

/// Bounds applied to every readiness wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Readiness {
    pub timeout: Duration,
    pub poll: Duration,
}

/// Poll `probe` until it succeeds or `readiness.timeout` elapses.
///
/// Non-retryable errors end the wait early.
///
/// # Errors
///
/// Returns [`StartupError::Timeout`] or, for non-retryable probe errors,
/// [`StartupError::Link`].
pub async fn wait_ready<T, F, Fut>(what: &str, readiness: Readiness, mut probe: F) -> Result<T, StartupError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, LinkError>>,
{
    let attempts = async {
        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            match probe().await {
                Ok(value) => return Ok(value),
                Err(e) if e.retryable() => {
                    debug!(what, attempt, error = %e, "startup: not ready yet");
                }
                Err(source) => return Err(StartupError::Link { what: what.to_string(), source }),
            }
            tokio::time::sleep(readiness.poll).await;
        }
    };
    tokio::time::timeout(readiness.timeout, attempts)
        .await
        .map_err(|_| StartupError::Timeout { what: what.to_string(), waited: readiness.timeout })?
}

/// Step 1: the table's `calibrated` message.
///
/// # Errors
///
/// See [`wait_ready`].
pub async fn wait_table_calibrated(table: &dyn TouchTable, readiness: Readiness) -> Result<bool, StartupError> {
    let calibrated = wait_ready("touch table calibrated message", readiness, || table.calibrated()).await?;
    info!(calibrated, "startup: touch table status received");
    Ok(calibrated)
}

/// What step 3 ended up doing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableOutcome {
    AlreadyCalibrated,
    Calibrated,
}

/// Step 3: calibrate the table unless it already was.
///
/// # Errors
///
/// Returns a timeout while waiting for the service, or the calibrate call's
/// failure.
pub async fn ensure_table_calibrated(
    table: &dyn TouchTable,
    already_calibrated: bool,
    readiness: Readiness,
) -> Result<TableOutcome, StartupError> {
    if already_calibrated {
        return Ok(TableOutcome::AlreadyCalibrated);
    }
    wait_ready("touch table calibrate service", readiness, || table.calibrate_service_ready()).await?;
    info!("startup: touch table calibrate service available, calibrating");
    table
        .calibrate()
        .await
        .map_err(|source| StartupError::Link { what: "touch table calibration".into(), source })?;
    info!("startup: touch table calibrated");
    Ok(TableOutcome::Calibrated)
}

#[cfg(test)]
#[path = "startup_test.rs"]
mod tests;
