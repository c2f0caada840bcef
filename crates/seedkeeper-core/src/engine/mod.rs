//! Transfer engine boundary
//!
//! The engine does the actual peer-to-peer work. The control plane only ever
//! talks to it through [`TransferEngine`]:
//!
//! 1. **Admission**: add a transfer from a torrent blob or a magnet identifier
//! 2. **Sampling**: enumerate active transfers and read their live metrics
//! 3. **Teardown**: release a transfer before its registry entry is dropped
//!
//! Implementations must answer quickly. Callers still wrap every call in a
//! timeout so a stuck engine cannot stall the sampler or a request.

mod memory;

pub use memory::MemoryEngine;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::EngineError;
use crate::job::{JobId, JobMetadata, LiveMetrics};

/// Result of admitting a transfer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AddedTransfer {
    pub id: JobId,
    pub metadata: JobMetadata,
    /// False when `metadata` is a placeholder the engine will fill in later
    pub resolved: bool,
}

/// One transfer's state as read on a sample tick
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EngineSample {
    pub metrics: LiveMetrics,
    /// Present once the engine knows the final name/size/file count
    pub metadata: Option<JobMetadata>,
}

#[async_trait]
pub trait TransferEngine: Send + Sync + 'static {
    /// Admit a transfer from raw `.torrent` bytes
    async fn add_from_blob(&self, blob: Vec<u8>) -> Result<AddedTransfer, EngineError>;

    /// Admit a transfer from a magnet-style identifier
    async fn add_from_identifier(&self, uri: &str) -> Result<AddedTransfer, EngineError>;

    /// Ids of every transfer the engine is currently running
    async fn list_active(&self) -> Result<Vec<JobId>, EngineError>;

    /// Live metrics (and metadata, once resolved) for one transfer
    async fn sample(&self, id: &str) -> Result<EngineSample, EngineError>;

    /// Release every engine resource held for `id`
    async fn destroy(&self, id: &str) -> Result<(), EngineError>;
}
