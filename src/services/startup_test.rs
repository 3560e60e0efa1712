use super::*;
use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;

fn fast() -> Readiness {
    Readiness { timeout: Duration::from_millis(200), poll: Duration::from_millis(5) }
}

fn refused() -> LinkError {
    LinkError::Request { peer: "table".into(), message: "connection refused".into() }
}

/// Touch table that comes up after `down_for` failed probes.
struct FakeTable {
    calibrated: bool,
    down_for: u32,
    probes: AtomicU32,
    calibrations: AtomicU32,
}

impl FakeTable {
    fn new(calibrated: bool, down_for: u32) -> Self {
        Self { calibrated, down_for, probes: AtomicU32::new(0), calibrations: AtomicU32::new(0) }
    }

    fn probe(&self) -> Result<(), LinkError> {
        let n = self.probes.fetch_add(1, Ordering::SeqCst);
        if n < self.down_for { Err(refused()) } else { Ok(()) }
    }
}

#[async_trait]
impl TouchTable for FakeTable {
    async fn calibrated(&self) -> Result<bool, LinkError> {
        self.probe().map(|()| self.calibrated)
    }

    async fn calibrate_service_ready(&self) -> Result<(), LinkError> {
        self.probe()
    }

    async fn calibrate(&self) -> Result<(), LinkError> {
        self.calibrations.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[tokio::test]
async fn wait_ready_retries_until_success() {
    let table = FakeTable::new(true, 3);
    let calibrated = wait_table_calibrated(&table, fast()).await.unwrap();
    assert!(calibrated);
    assert_eq!(table.probes.load(Ordering::SeqCst), 4);
}

#[tokio::test]
async fn wait_ready_times_out() {
    let table = FakeTable::new(true, u32::MAX);
    let err = wait_table_calibrated(&table, fast()).await.unwrap_err();
    assert!(matches!(err, StartupError::Timeout { .. }));
    assert!(err.to_string().contains("touch table calibrated message"));
}

#[tokio::test]
async fn wait_ready_stops_on_non_retryable_error() {
    let result: Result<(), StartupError> = wait_ready("probe", fast(), || async {
        Err(LinkError::Parse { peer: "p".into(), message: "bad".into() })
    })
    .await;
    assert!(matches!(result, Err(StartupError::Link { .. })));
}

#[tokio::test]
async fn calibrated_table_is_not_recalibrated() {
    let table = FakeTable::new(true, 0);
    let outcome = ensure_table_calibrated(&table, true, fast()).await.unwrap();
    assert_eq!(outcome, TableOutcome::AlreadyCalibrated);
    assert_eq!(table.calibrations.load(Ordering::SeqCst), 0);
    assert_eq!(table.probes.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn uncalibrated_table_waits_for_service_then_calibrates() {
    let table = FakeTable::new(false, 2);
    let outcome = ensure_table_calibrated(&table, false, fast()).await.unwrap();
    assert_eq!(outcome, TableOutcome::Calibrated);
    assert_eq!(table.calibrations.load(Ordering::SeqCst), 1);
    assert_eq!(table.probes.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn unreachable_calibrate_service_times_out() {
    let table = FakeTable::new(false, u32::MAX);
    let err = ensure_table_calibrated(&table, false, fast()).await.unwrap_err();
    assert!(matches!(err, StartupError::Timeout { .. }));
    assert_eq!(table.calibrations.load(Ordering::SeqCst), 0);
}
