//! Job registry: the authoritative map of tracked transfers
//!
//! The map and its insertion order sit behind a single `RwLock`. Creation,
//! removal and metric updates take the write half, so a listing never sees a
//! half-applied update or a partially removed entry, and one job's metrics
//! always change together.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

use crate::access::{self, Viewer};
use crate::engine::{EngineSample, TransferEngine};
use crate::error::{CoreError, EngineError, Result};
use crate::job::{Job, JobCounts, JobId, JobMetadata};

#[derive(Debug, Default)]
struct RegistryInner {
    jobs: HashMap<JobId, Job>,
    /// Insertion order, oldest first
    order: Vec<JobId>,
}

impl RegistryInner {
    fn ordered(&self) -> impl DoubleEndedIterator<Item = &Job> {
        self.order.iter().filter_map(|id| self.jobs.get(id))
    }
}

/// Process-wide job registry
pub struct JobRegistry {
    inner: RwLock<RegistryInner>,
    engine: Arc<dyn TransferEngine>,
    engine_timeout: Duration,
}

impl std::fmt::Debug for JobRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobRegistry")
            .field("engine_timeout", &self.engine_timeout)
            .finish_non_exhaustive()
    }
}

impl JobRegistry {
    pub fn new(engine: Arc<dyn TransferEngine>, engine_timeout: Duration) -> Self {
        Self {
            inner: RwLock::new(RegistryInner::default()),
            engine,
            engine_timeout,
        }
    }

    /// Insert a new job with zeroed live metrics.
    ///
    /// Fails with [`CoreError::DuplicateJob`] if `id` is already tracked.
    pub async fn create(
        &self,
        id: JobId,
        metadata: JobMetadata,
        resolved: bool,
        owner: &str,
    ) -> Result<Job> {
        let mut inner = self.inner.write().await;
        if inner.jobs.contains_key(&id) {
            tracing::info!(job_id = %id, owner, "Rejected duplicate job");
            return Err(CoreError::DuplicateJob(id));
        }

        let job = if resolved {
            Job::resolved(id.clone(), metadata, owner)
        } else {
            Job::provisional(id.clone(), metadata, owner)
        };
        inner.jobs.insert(id.clone(), job.clone());
        inner.order.push(id);

        tracing::info!(job_id = %job.id, owner, name = %job.name, "Created job");
        Ok(job)
    }

    pub async fn get(&self, id: &str) -> Result<Job> {
        self.inner
            .read()
            .await
            .jobs
            .get(id)
            .cloned()
            .ok_or_else(|| CoreError::NotFound(id.to_string()))
    }

    pub async fn contains(&self, id: &str) -> bool {
        self.inner.read().await.jobs.contains_key(id)
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.jobs.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Jobs visible to `viewer`, oldest first
    pub async fn list_for(&self, viewer: &Viewer) -> Vec<Job> {
        self.inner
            .read()
            .await
            .ordered()
            .filter(|job| access::can_view(viewer, job))
            .cloned()
            .collect()
    }

    /// Up to `limit` jobs visible to `viewer`, newest first
    pub async fn recent_for(&self, viewer: &Viewer, limit: usize) -> Vec<Job> {
        self.inner
            .read()
            .await
            .ordered()
            .rev()
            .filter(|job| access::can_view(viewer, job))
            .take(limit)
            .cloned()
            .collect()
    }

    /// Counters over the jobs visible to `viewer`
    pub async fn counts_for(&self, viewer: &Viewer) -> JobCounts {
        let inner = self.inner.read().await;
        JobCounts::tally(
            inner
                .ordered()
                .filter(|job| access::can_view(viewer, job)),
        )
    }

    /// Apply one engine sample to `id`.
    ///
    /// Returns the job's upload rate when the sample was applied, or `None`
    /// when the job is no longer tracked (a sample racing a removal).
    pub async fn update_metrics(&self, id: &str, sample: &EngineSample) -> Option<u64> {
        let mut inner = self.inner.write().await;
        let Some(job) = inner.jobs.get_mut(id) else {
            tracing::debug!(job_id = %id, "Dropping sample for untracked job");
            return None;
        };

        if let Some(metadata) = &sample.metadata {
            if job.resolve_metadata(metadata) {
                tracing::info!(
                    job_id = %id,
                    name = %job.name,
                    total_size = job.total_size,
                    "Job metadata resolved"
                );
            }
        }

        let previous = job.status;
        job.apply_metrics(&sample.metrics);
        if job.status != previous {
            tracing::info!(job_id = %id, from = %previous, to = %job.status, "Job status changed");
        }
        Some(job.upload_rate)
    }

    /// Remove `id` on behalf of `viewer`.
    ///
    /// The engine transfer is torn down while the write lock is held, and the
    /// entry is only dropped once teardown succeeded. Samplers queue behind the
    /// lock and then find the entry gone.
    pub async fn remove(&self, id: &str, viewer: &Viewer) -> Result<Job> {
        let mut inner = self.inner.write().await;
        let job = inner
            .jobs
            .get(id)
            .ok_or_else(|| CoreError::NotFound(id.to_string()))?;

        if !access::can_mutate(viewer, job) {
            tracing::warn!(job_id = %id, username = %viewer.username, "Denied job removal");
            return Err(CoreError::AccessDenied {
                job_id: id.to_string(),
                username: viewer.username.clone(),
            });
        }

        match tokio::time::timeout(self.engine_timeout, self.engine.destroy(id)).await {
            Ok(Ok(())) => {}
            // The engine already forgot it; the registry entry is stale either way.
            Ok(Err(EngineError::UnknownJob(_))) => {
                tracing::warn!(job_id = %id, "Engine had no transfer for removed job");
            }
            Ok(Err(e)) => {
                tracing::error!(job_id = %id, "Engine failed to destroy transfer: {}", e);
                return Err(e.into());
            }
            Err(_) => {
                let e = EngineError::Timeout(self.engine_timeout.as_millis() as u64);
                tracing::error!(job_id = %id, "Engine failed to destroy transfer: {}", e);
                return Err(e.into());
            }
        }

        inner.order.retain(|existing| existing != id);
        let removed = inner
            .jobs
            .remove(id)
            .ok_or_else(|| CoreError::NotFound(id.to_string()))?;

        tracing::info!(job_id = %id, username = %viewer.username, "Removed job");
        Ok(removed)
    }

    /// Release every engine transfer and empty the registry. Used at shutdown.
    pub async fn release_all(&self) -> usize {
        let mut inner = self.inner.write().await;
        let ids: Vec<JobId> = inner.order.drain(..).collect();
        for id in &ids {
            match tokio::time::timeout(self.engine_timeout, self.engine.destroy(id)).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => tracing::warn!(job_id = %id, "Release failed: {}", e),
                Err(_) => tracing::warn!(job_id = %id, "Release timed out"),
            }
        }
        inner.jobs.clear();
        tracing::info!(released = ids.len(), "Released all engine transfers");
        ids.len()
    }
}
