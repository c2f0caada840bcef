//! Control plane facade
//!
//! [`Control`] bundles the process-wide services (registry, ledger, engine,
//! disk probe) behind the operations the web layer exposes. It is cheap to
//! clone and is constructed once at startup.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::access::{self, Viewer};
use crate::config::TelemetryConfig;
use crate::disk::{DiskProbe, DiskSnapshot};
use crate::engine::{AddedTransfer, TransferEngine};
use crate::error::{CoreError, EngineError, Result};
use crate::job::{Job, JobCounts};
use crate::ledger::{LedgerTotals, QuotaReport, TrafficLedger};
use crate::registry::JobRegistry;
use crate::sampler::Sampler;
use crate::session::SampleLoop;

/// Answer to "current stats for viewer V"
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatsReport {
    pub torrents: JobCounts,
    pub traffic: LedgerTotals,
    pub disk_space: DiskSnapshot,
    pub quota: QuotaReport,
}

/// Everything one viewer sees on a push tick
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewerSnapshot {
    pub torrents: Vec<Job>,
    pub counts: JobCounts,
    pub stats: LedgerTotals,
    pub disk_space: DiskSnapshot,
    pub quota: QuotaReport,
    /// Unix milliseconds
    pub timestamp: i64,
}

/// Cadences and limits advertised to clients
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientSettings {
    pub sample_interval_secs: u64,
    pub client_poll_secs: u64,
    pub monthly_cap_bytes: u64,
    pub recent_limit: usize,
}

struct ControlInner {
    registry: Arc<JobRegistry>,
    ledger: Arc<TrafficLedger>,
    engine: Arc<dyn TransferEngine>,
    disk: DiskProbe,
    config: TelemetryConfig,
}

#[derive(Clone)]
pub struct Control {
    inner: Arc<ControlInner>,
}

impl std::fmt::Debug for Control {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Control")
            .field("config", &self.inner.config)
            .field("disk", &self.inner.disk)
            .finish_non_exhaustive()
    }
}

impl Control {
    /// Wire up the services with a wall-clock ledger and a host disk probe
    pub fn new(engine: Arc<dyn TransferEngine>, config: TelemetryConfig) -> Self {
        let disk = DiskProbe::new(config.disk_path.clone(), config.probe_timeout());
        Self::with_parts(engine, Arc::new(TrafficLedger::new()), disk, config)
    }

    pub fn with_parts(
        engine: Arc<dyn TransferEngine>,
        ledger: Arc<TrafficLedger>,
        disk: DiskProbe,
        config: TelemetryConfig,
    ) -> Self {
        let registry = Arc::new(JobRegistry::new(engine.clone(), config.engine_timeout()));
        Self {
            inner: Arc::new(ControlInner {
                registry,
                ledger,
                engine,
                disk,
                config,
            }),
        }
    }

    pub fn registry(&self) -> &Arc<JobRegistry> {
        &self.inner.registry
    }

    pub fn ledger(&self) -> &Arc<TrafficLedger> {
        &self.inner.ledger
    }

    pub fn config(&self) -> &TelemetryConfig {
        &self.inner.config
    }

    pub fn settings(&self) -> ClientSettings {
        let config = &self.inner.config;
        ClientSettings {
            sample_interval_secs: config.sample_interval().as_secs(),
            client_poll_secs: config.client_poll_interval().as_secs(),
            monthly_cap_bytes: config.monthly_cap_bytes,
            recent_limit: config.recent_limit,
        }
    }

    pub fn sampler(&self) -> Sampler {
        Sampler::new(
            self.inner.registry.clone(),
            self.inner.ledger.clone(),
            self.inner.engine.clone(),
            self.inner.config.sample_interval(),
            self.inner.config.engine_timeout(),
        )
    }

    /// Start the process-wide sampler
    pub fn spawn_sampler(&self, cancel: CancellationToken) -> JoinHandle<()> {
        self.sampler().spawn(cancel)
    }

    /// Push loop for one viewer connection
    pub fn sample_loop(&self, viewer: Viewer) -> SampleLoop {
        SampleLoop::new(self.clone(), viewer, self.inner.config.sample_interval())
    }

    pub async fn list_jobs(&self, viewer: &Viewer) -> Vec<Job> {
        self.inner.registry.list_for(viewer).await
    }

    pub async fn recent_jobs(&self, viewer: &Viewer) -> Vec<Job> {
        self.inner
            .registry
            .recent_for(viewer, self.inner.config.recent_limit)
            .await
    }

    pub async fn get_job(&self, viewer: &Viewer, id: &str) -> Result<Job> {
        let job = self.inner.registry.get(id).await?;
        if !access::can_view(viewer, &job) {
            return Err(CoreError::AccessDenied {
                job_id: id.to_string(),
                username: viewer.username.clone(),
            });
        }
        Ok(job)
    }

    /// Admit a `.torrent` blob on behalf of `viewer`
    pub async fn add_from_blob(&self, viewer: &Viewer, blob: Vec<u8>) -> Result<Job> {
        if blob.is_empty() {
            return Err(CoreError::InvalidInput("torrent file is empty".to_string()));
        }
        let added = self
            .engine_call(self.inner.engine.add_from_blob(blob))
            .await?;
        self.track(added, viewer).await
    }

    /// Admit a magnet link on behalf of `viewer`
    pub async fn add_from_identifier(&self, viewer: &Viewer, uri: &str) -> Result<Job> {
        let uri = uri.trim();
        if !uri.starts_with("magnet:") {
            return Err(CoreError::InvalidInput("invalid magnet URI".to_string()));
        }
        let added = self
            .engine_call(self.inner.engine.add_from_identifier(uri))
            .await?;
        self.track(added, viewer).await
    }

    async fn engine_call<F>(&self, call: F) -> Result<AddedTransfer>
    where
        F: std::future::Future<Output = std::result::Result<AddedTransfer, EngineError>>,
    {
        let limit = self.inner.config.engine_timeout();
        match tokio::time::timeout(limit, call).await {
            Ok(Ok(added)) => Ok(added),
            Ok(Err(e)) => {
                warn!("Engine refused transfer: {}", e);
                Err(e.into())
            }
            Err(_) => {
                let e = EngineError::Timeout(limit.as_millis() as u64);
                warn!("Engine refused transfer: {}", e);
                Err(e.into())
            }
        }
    }

    async fn track(&self, added: AddedTransfer, viewer: &Viewer) -> Result<Job> {
        // The engine dedups by content id, so a repeat add lands here with an
        // id the registry already holds and is rejected without touching the
        // running transfer.
        self.inner
            .registry
            .create(added.id, added.metadata, added.resolved, &viewer.username)
            .await
    }

    pub async fn remove_job(&self, viewer: &Viewer, id: &str) -> Result<Job> {
        self.inner.registry.remove(id, viewer).await
    }

    pub async fn stats(&self, viewer: &Viewer) -> StatsReport {
        let torrents = self.inner.registry.counts_for(viewer).await;
        let traffic = self.inner.ledger.totals();
        let quota = self.inner.ledger.quota(self.inner.config.monthly_cap_bytes);
        let disk_space = self.inner.disk.probe().await;

        StatsReport {
            torrents,
            traffic,
            disk_space,
            quota,
        }
    }

    pub async fn snapshot(&self, viewer: &Viewer) -> ViewerSnapshot {
        let torrents = self.inner.registry.list_for(viewer).await;
        let counts = JobCounts::tally(&torrents);
        let stats = self.inner.ledger.totals();
        let quota = self.inner.ledger.quota(self.inner.config.monthly_cap_bytes);
        let disk_space = self.inner.disk.probe().await;

        ViewerSnapshot {
            torrents,
            counts,
            stats,
            disk_space,
            quota,
            timestamp: chrono::Utc::now().timestamp_millis(),
        }
    }

    /// Release every engine handle. Call after the sampler has stopped.
    pub async fn shutdown(&self) -> usize {
        let released = self.inner.registry.release_all().await;
        info!(released, "Control plane shut down");
        released
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::disk::{CommandRunner, Platform, ProbeError};
    use crate::engine::MemoryEngine;
    use crate::ledger::{ManualClock, MonthKey};
    use async_trait::async_trait;
    use std::time::Duration;

    struct DfRunner;

    #[async_trait]
    impl CommandRunner for DfRunner {
        async fn run(&self, _program: &str, _args: &[String]) -> std::result::Result<String, ProbeError> {
            Ok("Filesystem 1-blocks Used Available Capacity Mounted on\n/dev/sda1 1000 250 750 25% /\n".to_string())
        }
    }

    fn control() -> (MemoryEngine, Control) {
        let engine = MemoryEngine::new();
        let ledger = Arc::new(TrafficLedger::with_clock(Arc::new(ManualClock::new(
            MonthKey::new(2025, 1),
        ))));
        let disk = DiskProbe::with_runner(
            ".",
            Duration::from_secs(1),
            Platform::Linux,
            Arc::new(DfRunner),
        );
        let control = Control::with_parts(
            Arc::new(engine.clone()),
            ledger,
            disk,
            TelemetryConfig::default(),
        );
        (engine, control)
    }

    #[tokio::test]
    async fn test_add_magnet_rejects_non_magnet() {
        let (_, control) = control();
        let err = control
            .add_from_identifier(&Viewer::user("alice"), "http://example.com/a.torrent")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "invalid_input");
    }

    #[tokio::test]
    async fn test_add_empty_blob_is_invalid() {
        let (_, control) = control();
        let err = control
            .add_from_blob(&Viewer::user("alice"), Vec::new())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "invalid_input");
    }

    #[tokio::test]
    async fn test_duplicate_add_is_rejected() {
        let (engine, control) = control();
        let alice = Viewer::user("alice");
        let uri = "magnet:?xt=urn:btih:feed&dn=Feed";

        let job = control.add_from_identifier(&alice, uri).await.unwrap();
        assert_eq!(job.name, "Feed");
        assert!(!job.metadata_resolved);

        let err = control
            .add_from_identifier(&Viewer::user("bob"), uri)
            .await
            .unwrap_err();
        assert_eq!(err, CoreError::DuplicateJob("feed".to_string()));
        assert!(engine.contains("feed"));
        assert_eq!(control.registry().get("feed").await.unwrap().owner, "alice");
    }

    #[tokio::test]
    async fn test_engine_rejection_is_engine_failure() {
        let (_, control) = control();
        let err = control
            .add_from_identifier(&Viewer::user("alice"), "magnet:?dn=no-hash")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "engine_failure");
        assert!(control.registry().is_empty().await);
    }

    #[tokio::test]
    async fn test_get_job_is_gated() {
        let (_, control) = control();
        control
            .add_from_identifier(&Viewer::user("alice"), "magnet:?xt=urn:btih:a1")
            .await
            .unwrap();

        assert!(control.get_job(&Viewer::user("alice"), "a1").await.is_ok());
        assert!(control.get_job(&Viewer::admin("root"), "a1").await.is_ok());
        assert!(matches!(
            control.get_job(&Viewer::user("bob"), "a1").await,
            Err(CoreError::AccessDenied { .. })
        ));
    }

    #[tokio::test]
    async fn test_stats_report() {
        let (_, control) = control();
        let alice = Viewer::user("alice");
        control
            .add_from_identifier(&alice, "magnet:?xt=urn:btih:a1")
            .await
            .unwrap();
        control.ledger().record_upload(1024);

        let stats = control.stats(&alice).await;
        assert_eq!(stats.torrents.total, 1);
        assert_eq!(stats.torrents.active, 1);
        assert_eq!(stats.traffic.monthly, 1024);
        assert_eq!(stats.quota.used, 1024);
        assert_eq!(
            stats.quota.remaining,
            crate::config::DEFAULT_MONTHLY_CAP_BYTES as i64 - 1024
        );
        assert_eq!(stats.disk_space.total_bytes, 1000);
        assert_eq!(stats.disk_space.used_percent, 25.0);

        let bob = control.stats(&Viewer::user("bob")).await;
        assert_eq!(bob.torrents.total, 0);
    }

    #[tokio::test]
    async fn test_snapshot_is_viewer_scoped() {
        let (_, control) = control();
        control
            .add_from_identifier(&Viewer::user("alice"), "magnet:?xt=urn:btih:a1")
            .await
            .unwrap();
        control
            .add_from_identifier(&Viewer::user("bob"), "magnet:?xt=urn:btih:b1")
            .await
            .unwrap();

        let snapshot = control.snapshot(&Viewer::user("bob")).await;
        assert_eq!(snapshot.torrents.len(), 1);
        assert_eq!(snapshot.torrents[0].id, "b1");
        assert_eq!(snapshot.counts.total, 1);

        let snapshot = control.snapshot(&Viewer::admin("root")).await;
        assert_eq!(snapshot.torrents.len(), 2);
    }

    #[tokio::test]
    async fn test_shutdown_releases_engine_handles() {
        let (engine, control) = control();
        control
            .add_from_identifier(&Viewer::user("alice"), "magnet:?xt=urn:btih:a1")
            .await
            .unwrap();

        assert_eq!(control.shutdown().await, 1);
        assert!(!engine.contains("a1"));
        assert!(control.registry().is_empty().await);
    }
}
