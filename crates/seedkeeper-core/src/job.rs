//! Job model: one tracked transfer

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Stable content identifier assigned by the engine (info hash or similar)
pub type JobId = String;

/// Job status, recomputed on every sample tick
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Downloading,
    Seeding,
    /// The engine reported a fault for this transfer
    Errored,
}

impl JobStatus {
    /// Derive status from an engine sample
    pub fn derive(completion: f64, fault: Option<&str>) -> Self {
        if fault.is_some() {
            JobStatus::Errored
        } else if completion >= 1.0 {
            JobStatus::Seeding
        } else {
            JobStatus::Downloading
        }
    }

    /// Downloading or seeding
    pub fn is_active(&self) -> bool {
        matches!(self, JobStatus::Downloading | JobStatus::Seeding)
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobStatus::Downloading => write!(f, "downloading"),
            JobStatus::Seeding => write!(f, "seeding"),
            JobStatus::Errored => write!(f, "errored"),
        }
    }
}

/// Descriptive metadata, known up front for blobs and resolved later for magnets
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobMetadata {
    pub name: String,
    pub total_size: u64,
    pub file_count: u32,
}

impl JobMetadata {
    pub fn new(name: impl Into<String>, total_size: u64, file_count: u32) -> Self {
        Self {
            name: name.into(),
            total_size,
            file_count,
        }
    }

    /// Placeholder used while the engine is still resolving a magnet
    pub fn pending(name: Option<String>) -> Self {
        Self {
            name: name.unwrap_or_else(|| "Unknown".to_string()),
            total_size: 0,
            file_count: 0,
        }
    }
}

/// Live metrics pulled from the engine on each tick
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LiveMetrics {
    pub peer_count: u32,
    pub downloaded_bytes: u64,
    pub uploaded_bytes: u64,
    /// Bytes per second
    pub download_rate: u64,
    /// Bytes per second
    pub upload_rate: u64,
    /// 0.0 ..= 1.0
    pub completion: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fault: Option<String>,
}

/// Upload/download ratio, 0 when nothing was downloaded yet
pub fn share_ratio(uploaded: u64, downloaded: u64) -> f64 {
    if downloaded == 0 {
        0.0
    } else {
        uploaded as f64 / downloaded as f64
    }
}

/// One tracked transfer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    pub name: String,
    pub total_size: u64,
    pub file_count: u32,
    /// False while name/size are provisional
    pub metadata_resolved: bool,
    pub owner: String,

    pub downloaded_bytes: u64,
    pub uploaded_bytes: u64,
    pub peer_count: u32,
    pub download_rate: u64,
    pub upload_rate: u64,
    pub progress: f64,
    pub ratio: f64,
    pub status: JobStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    pub added_at: DateTime<Utc>,
}

impl Job {
    /// New job with zeroed live metrics and provisional metadata
    pub fn provisional(id: JobId, metadata: JobMetadata, owner: impl Into<String>) -> Self {
        Self {
            id,
            name: metadata.name,
            total_size: metadata.total_size,
            file_count: metadata.file_count,
            metadata_resolved: false,
            owner: owner.into(),
            downloaded_bytes: 0,
            uploaded_bytes: 0,
            peer_count: 0,
            download_rate: 0,
            upload_rate: 0,
            progress: 0.0,
            ratio: 0.0,
            status: JobStatus::Downloading,
            error: None,
            added_at: Utc::now(),
        }
    }

    /// New job whose metadata is already final
    pub fn resolved(id: JobId, metadata: JobMetadata, owner: impl Into<String>) -> Self {
        let mut job = Self::provisional(id, metadata, owner);
        job.metadata_resolved = true;
        job
    }

    /// Overwrite all live metrics in one step and recompute derived fields
    pub fn apply_metrics(&mut self, metrics: &LiveMetrics) {
        self.peer_count = metrics.peer_count;
        self.downloaded_bytes = metrics.downloaded_bytes;
        self.uploaded_bytes = metrics.uploaded_bytes;
        self.download_rate = metrics.download_rate;
        self.upload_rate = metrics.upload_rate;
        self.progress = metrics.completion.clamp(0.0, 1.0);
        self.ratio = share_ratio(metrics.uploaded_bytes, metrics.downloaded_bytes);
        self.status = JobStatus::derive(metrics.completion, metrics.fault.as_deref());
        self.error = metrics.fault.clone();
    }

    /// Replace provisional metadata. Only the first resolution is applied.
    pub fn resolve_metadata(&mut self, metadata: &JobMetadata) -> bool {
        if self.metadata_resolved {
            return false;
        }
        self.name = metadata.name.clone();
        self.total_size = metadata.total_size;
        self.file_count = metadata.file_count;
        self.metadata_resolved = true;
        true
    }
}

/// Per-viewer job counters reported in stats
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobCounts {
    pub total: usize,
    pub active: usize,
    pub seeding: usize,
    pub errored: usize,
}

impl JobCounts {
    pub fn tally<'a>(jobs: impl IntoIterator<Item = &'a Job>) -> Self {
        jobs.into_iter().fold(JobCounts::default(), |mut acc, job| {
            acc.total += 1;
            if job.status.is_active() {
                acc.active += 1;
            }
            match job.status {
                JobStatus::Seeding => acc.seeding += 1,
                JobStatus::Errored => acc.errored += 1,
                JobStatus::Downloading => {}
            }
            acc
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_job() -> Job {
        Job::resolved(
            "deadbeef".to_string(),
            JobMetadata::new("debian.iso", 1000, 1),
            "alice",
        )
    }

    #[test]
    fn test_ratio_is_zero_without_download() {
        assert_eq!(share_ratio(500, 0), 0.0);
        assert_eq!(share_ratio(0, 0), 0.0);
    }

    #[test]
    fn test_ratio_divides() {
        assert_eq!(share_ratio(250, 500), 0.5);
        assert_eq!(share_ratio(3000, 1000), 3.0);
    }

    #[test]
    fn test_new_job_starts_downloading_with_zeroed_metrics() {
        let job = sample_job();
        assert_eq!(job.status, JobStatus::Downloading);
        assert_eq!(job.downloaded_bytes, 0);
        assert_eq!(job.uploaded_bytes, 0);
        assert_eq!(job.ratio, 0.0);
    }

    #[test]
    fn test_apply_metrics_recomputes_status() {
        let mut job = sample_job();
        job.apply_metrics(&LiveMetrics {
            downloaded_bytes: 500,
            uploaded_bytes: 250,
            completion: 0.5,
            ..Default::default()
        });
        assert_eq!(job.ratio, 0.5);
        assert_eq!(job.status, JobStatus::Downloading);

        job.apply_metrics(&LiveMetrics {
            downloaded_bytes: 1000,
            uploaded_bytes: 250,
            completion: 1.0,
            ..Default::default()
        });
        assert_eq!(job.status, JobStatus::Seeding);
        assert_eq!(job.ratio, 0.25);
    }

    #[test]
    fn test_fault_marks_errored_and_clears_on_recovery() {
        let mut job = sample_job();
        job.apply_metrics(&LiveMetrics {
            completion: 1.0,
            fault: Some("tracker unreachable".to_string()),
            ..Default::default()
        });
        assert_eq!(job.status, JobStatus::Errored);
        assert_eq!(job.error.as_deref(), Some("tracker unreachable"));

        job.apply_metrics(&LiveMetrics {
            completion: 1.0,
            ..Default::default()
        });
        assert_eq!(job.status, JobStatus::Seeding);
        assert!(job.error.is_none());
    }

    #[test]
    fn test_metadata_resolves_once() {
        let mut job = Job::provisional(
            "cafe".to_string(),
            JobMetadata::pending(Some("partial".to_string())),
            "bob",
        );
        assert!(!job.metadata_resolved);
        assert!(job.resolve_metadata(&JobMetadata::new("full name", 4096, 3)));
        assert_eq!(job.name, "full name");
        assert_eq!(job.total_size, 4096);

        assert!(!job.resolve_metadata(&JobMetadata::new("other", 1, 1)));
        assert_eq!(job.name, "full name");
    }

    #[test]
    fn test_counts() {
        let mut seeding = sample_job();
        seeding.status = JobStatus::Seeding;
        let mut errored = sample_job();
        errored.status = JobStatus::Errored;
        let downloading = sample_job();

        let counts = JobCounts::tally([&seeding, &errored, &downloading]);
        assert_eq!(
            counts,
            JobCounts {
                total: 3,
                active: 2,
                seeding: 1,
                errored: 1
            }
        );
    }
}
