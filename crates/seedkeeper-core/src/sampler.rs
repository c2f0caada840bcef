//! Sampler: the single writer of live metrics and traffic totals
//!
//! One sampler runs per process. Each tick it enumerates the engine's active
//! transfers, polls them concurrently (each poll bounded by the engine
//! timeout), applies every sample to the registry and adds each job's upload
//! rate to the ledger. Viewer loops never touch the engine or the ledger
//! counters themselves, so traffic is counted once per tick no matter how many
//! viewers are connected.

use futures::future::join_all;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::engine::TransferEngine;
use crate::ledger::TrafficLedger;
use crate::registry::JobRegistry;

/// Outcome of one sampling pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    /// Samples applied to a tracked job
    pub sampled: usize,
    /// Samples for jobs the registry no longer tracks
    pub skipped: usize,
    /// Polls that errored or timed out
    pub failed: usize,
    /// Bytes added to the ledger this tick
    pub recorded_bytes: u64,
}

pub struct Sampler {
    registry: Arc<JobRegistry>,
    ledger: Arc<TrafficLedger>,
    engine: Arc<dyn TransferEngine>,
    interval: Duration,
    engine_timeout: Duration,
}

impl Sampler {
    pub fn new(
        registry: Arc<JobRegistry>,
        ledger: Arc<TrafficLedger>,
        engine: Arc<dyn TransferEngine>,
        interval: Duration,
        engine_timeout: Duration,
    ) -> Self {
        Self {
            registry,
            ledger,
            engine,
            interval,
            engine_timeout,
        }
    }

    /// Run one sampling pass
    #[instrument(skip(self), level = "debug")]
    pub async fn tick(&self) -> TickReport {
        let mut report = TickReport::default();

        let ids = match tokio::time::timeout(self.engine_timeout, self.engine.list_active()).await
        {
            Ok(Ok(ids)) => ids,
            Ok(Err(e)) => {
                warn!("Engine could not list active transfers: {}", e);
                return report;
            }
            Err(_) => {
                warn!("Engine timed out listing active transfers");
                return report;
            }
        };

        let polls = ids.iter().map(|id| async move {
            let outcome = tokio::time::timeout(self.engine_timeout, self.engine.sample(id)).await;
            (id, outcome)
        });

        for (id, outcome) in join_all(polls).await {
            match outcome {
                Ok(Ok(sample)) => match self.registry.update_metrics(id, &sample).await {
                    Some(upload_rate) => {
                        // The instantaneous rate is booked as this tick's volume.
                        self.ledger.record_upload(upload_rate);
                        report.sampled += 1;
                        report.recorded_bytes = report.recorded_bytes.saturating_add(upload_rate);
                    }
                    None => report.skipped += 1,
                },
                Ok(Err(e)) => {
                    warn!(job_id = %id, "Sampling failed: {}", e);
                    report.failed += 1;
                }
                Err(_) => {
                    warn!(job_id = %id, "Sampling timed out");
                    report.failed += 1;
                }
            }
        }

        debug!(
            sampled = report.sampled,
            skipped = report.skipped,
            failed = report.failed,
            recorded_bytes = report.recorded_bytes,
            "Sample tick complete"
        );
        report
    }

    /// Tick at the configured interval until `cancel` fires
    pub async fn run(self, cancel: CancellationToken) {
        info!(interval = ?self.interval, "Sampler started");
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    self.tick().await;
                }
            }
        }
        info!("Sampler stopped");
    }

    pub fn spawn(self, cancel: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(self.run(cancel))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::MemoryEngine;
    use crate::job::{JobMetadata, JobStatus, LiveMetrics};
    use crate::ledger::{ManualClock, MonthKey};

    struct Fixture {
        engine: MemoryEngine,
        registry: Arc<JobRegistry>,
        ledger: Arc<TrafficLedger>,
        sampler: Sampler,
    }

    fn fixture() -> Fixture {
        let engine = MemoryEngine::new();
        let engine_dyn: Arc<dyn TransferEngine> = Arc::new(engine.clone());
        let registry = Arc::new(JobRegistry::new(engine_dyn.clone(), Duration::from_secs(1)));
        let ledger = Arc::new(TrafficLedger::with_clock(Arc::new(ManualClock::new(
            MonthKey::new(2025, 4),
        ))));
        let sampler = Sampler::new(
            registry.clone(),
            ledger.clone(),
            engine_dyn,
            Duration::from_secs(2),
            Duration::from_secs(1),
        );
        Fixture {
            engine,
            registry,
            ledger,
            sampler,
        }
    }

    async fn admit(fx: &Fixture, hash: &str, owner: &str) -> String {
        let added = fx
            .engine
            .add_from_identifier(&format!("magnet:?xt=urn:btih:{}", hash))
            .await
            .unwrap();
        fx.registry
            .create(added.id.clone(), added.metadata, added.resolved, owner)
            .await
            .unwrap();
        added.id
    }

    #[tokio::test]
    async fn test_tick_updates_registry_and_ledger() {
        let fx = fixture();
        let id = admit(&fx, "aa", "alice").await;
        fx.engine.set_metrics(
            &id,
            LiveMetrics {
                downloaded_bytes: 500,
                uploaded_bytes: 250,
                upload_rate: 100,
                completion: 0.5,
                ..Default::default()
            },
        );

        let report = fx.sampler.tick().await;
        assert_eq!(report.sampled, 1);
        assert_eq!(report.recorded_bytes, 100);
        assert_eq!(fx.ledger.monthly(), 100);

        let job = fx.registry.get(&id).await.unwrap();
        assert_eq!(job.ratio, 0.5);
        assert_eq!(job.status, JobStatus::Downloading);
    }

    #[tokio::test]
    async fn test_each_tick_records_once() {
        let fx = fixture();
        let id = admit(&fx, "aa", "alice").await;
        fx.engine.set_metrics(
            &id,
            LiveMetrics {
                upload_rate: 10,
                ..Default::default()
            },
        );

        for _ in 0..3 {
            fx.sampler.tick().await;
        }
        assert_eq!(fx.ledger.totals().total, 30);
    }

    #[tokio::test]
    async fn test_failing_job_does_not_block_others() {
        let fx = fixture();
        let bad = admit(&fx, "bad", "alice").await;
        let good = admit(&fx, "good", "bob").await;
        fx.engine.fail_sampling(&bad, true);
        fx.engine.set_metrics(
            &good,
            LiveMetrics {
                upload_rate: 7,
                completion: 1.0,
                ..Default::default()
            },
        );

        let report = fx.sampler.tick().await;
        assert_eq!(report.failed, 1);
        assert_eq!(report.sampled, 1);
        assert_eq!(
            fx.registry.get(&good).await.unwrap().status,
            JobStatus::Seeding
        );
        assert_eq!(fx.ledger.monthly(), 7);
    }

    #[tokio::test]
    async fn test_untracked_engine_jobs_are_skipped() {
        let fx = fixture();
        let added = fx
            .engine
            .add_from_identifier("magnet:?xt=urn:btih:orphan")
            .await
            .unwrap();
        fx.engine.set_metrics(
            &added.id,
            LiveMetrics {
                upload_rate: 999,
                ..Default::default()
            },
        );

        let report = fx.sampler.tick().await;
        assert_eq!(report.skipped, 1);
        assert_eq!(fx.ledger.monthly(), 0);
    }

    #[tokio::test]
    async fn test_resolved_metadata_is_applied() {
        let fx = fixture();
        let id = admit(&fx, "mm", "alice").await;
        assert!(!fx.registry.get(&id).await.unwrap().metadata_resolved);

        fx.engine
            .resolve(&id, JobMetadata::new("Resolved Name", 2048, 4));
        fx.sampler.tick().await;

        let job = fx.registry.get(&id).await.unwrap();
        assert!(job.metadata_resolved);
        assert_eq!(job.name, "Resolved Name");
        assert_eq!(job.file_count, 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_stops_on_cancel() {
        let fx = fixture();
        let cancel = CancellationToken::new();
        let handle = fx.sampler.spawn(cancel.clone());

        tokio::time::sleep(Duration::from_secs(5)).await;
        cancel.cancel();
        handle.await.unwrap();
    }
}
