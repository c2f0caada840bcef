//! Stalled engine behaviour
//!
//! Every engine call made by the sampler, by removal and by admission is
//! bounded by `engine_timeout_ms`. These tests hand the control plane an
//! engine that never answers and check that each path gives up in time.

use async_trait::async_trait;
use seedkeeper_core::ledger::{ManualClock, MonthKey};
use seedkeeper_core::{
    AddedTransfer, Control, CoreError, DiskProbe, EngineError, EngineSample, JobId, JobMetadata,
    TelemetryConfig, TrafficLedger, TransferEngine, Viewer,
};
use std::sync::Arc;
use std::time::Duration;

/// Engine whose calls never complete, except `list_active` when given ids
struct StalledEngine {
    active: Option<Vec<JobId>>,
}

#[async_trait]
impl TransferEngine for StalledEngine {
    async fn add_from_blob(&self, _blob: Vec<u8>) -> Result<AddedTransfer, EngineError> {
        std::future::pending().await
    }

    async fn add_from_identifier(&self, _uri: &str) -> Result<AddedTransfer, EngineError> {
        std::future::pending().await
    }

    async fn list_active(&self) -> Result<Vec<JobId>, EngineError> {
        match &self.active {
            Some(ids) => Ok(ids.clone()),
            None => std::future::pending().await,
        }
    }

    async fn sample(&self, _id: &str) -> Result<EngineSample, EngineError> {
        std::future::pending().await
    }

    async fn destroy(&self, _id: &str) -> Result<(), EngineError> {
        std::future::pending().await
    }
}

fn control(active: Option<Vec<JobId>>) -> Control {
    let config = TelemetryConfig {
        engine_timeout_ms: 500,
        ..Default::default()
    };
    let ledger = Arc::new(TrafficLedger::with_clock(Arc::new(ManualClock::new(
        MonthKey::new(2025, 6),
    ))));
    let disk = DiskProbe::new(".", Duration::from_secs(1));
    Control::with_parts(Arc::new(StalledEngine { active }), ledger, disk, config)
}

#[tokio::test(start_paused = true)]
async fn test_tick_gives_up_when_listing_stalls() {
    let control = control(None);

    let report = control.sampler().tick().await;
    assert_eq!(report.sampled, 0);
    assert_eq!(report.failed, 0);
    assert_eq!(report.recorded_bytes, 0);
    assert_eq!(control.ledger().totals().total, 0);
}

#[tokio::test(start_paused = true)]
async fn test_tick_counts_stalled_samples_as_failed() {
    let control = control(Some(vec!["a1".to_string(), "b2".to_string()]));
    control
        .registry()
        .create("a1".to_string(), JobMetadata::new("a1", 10, 1), true, "alice")
        .await
        .unwrap();

    let report = control.sampler().tick().await;
    assert_eq!(report.failed, 2);
    assert_eq!(report.sampled, 0);
    assert_eq!(control.ledger().monthly(), 0);
    assert_eq!(control.registry().get("a1").await.unwrap().uploaded_bytes, 0);
}

#[tokio::test(start_paused = true)]
async fn test_remove_times_out_and_keeps_entry() {
    let control = control(None);
    let alice = Viewer::user("alice");
    control
        .registry()
        .create("a1".to_string(), JobMetadata::new("a1", 10, 1), true, "alice")
        .await
        .unwrap();

    let err = control.remove_job(&alice, "a1").await.unwrap_err();
    assert!(matches!(err, CoreError::Engine(_)));
    assert!(control.registry().contains("a1").await);
    assert_eq!(control.list_jobs(&alice).await.len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_admission_times_out_as_engine_failure() {
    let control = control(None);
    let alice = Viewer::user("alice");

    let err = control
        .add_from_identifier(&alice, "magnet:?xt=urn:btih:slow")
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "engine_failure");

    let err = control
        .add_from_blob(&alice, b"d4:infod6:lengthi1eee".to_vec())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "engine_failure");
    assert!(control.registry().is_empty().await);
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_does_not_hang_on_stalled_destroy() {
    let control = control(None);
    control
        .registry()
        .create("a1".to_string(), JobMetadata::new("a1", 10, 1), true, "alice")
        .await
        .unwrap();

    assert_eq!(control.shutdown().await, 1);
    assert!(control.registry().is_empty().await);
}
