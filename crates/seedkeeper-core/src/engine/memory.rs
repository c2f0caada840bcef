//! In-memory transfer engine
//!
//! Tracks admitted transfers without moving any bytes. It derives content
//! ids the way a real client would surface them (hash of the torrent blob,
//! or the `btih` hash of a magnet link) and reports whatever metrics have
//! been scripted with [`MemoryEngine::set_metrics`]. Used when no external
//! engine is attached, and throughout the test suites.

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock};

use super::{AddedTransfer, EngineSample, TransferEngine};
use crate::error::EngineError;
use crate::job::{JobId, JobMetadata, LiveMetrics};

/// Length of a hex-encoded v1 info hash
const CONTENT_ID_LEN: usize = 40;

#[derive(Debug, Clone)]
struct MemoryTransfer {
    metadata: JobMetadata,
    resolved: bool,
    metrics: LiveMetrics,
}

#[derive(Debug, Default)]
struct EngineState {
    transfers: HashMap<JobId, MemoryTransfer>,
    order: Vec<JobId>,
    failing_samples: HashSet<JobId>,
    reject_destroy: Option<String>,
    destroyed: Vec<JobId>,
}

/// Engine that keeps transfers in a map
#[derive(Debug, Clone, Default)]
pub struct MemoryEngine {
    state: Arc<RwLock<EngineState>>,
}

impl MemoryEngine {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, EngineState> {
        self.state.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, EngineState> {
        self.state.write().unwrap_or_else(|e| e.into_inner())
    }

    fn admit(&self, id: JobId, metadata: JobMetadata, resolved: bool) -> AddedTransfer {
        let mut state = self.write();
        if let Some(existing) = state.transfers.get(&id) {
            // Same content: hand back the running transfer instead of a second one.
            return AddedTransfer {
                id,
                metadata: existing.metadata.clone(),
                resolved: existing.resolved,
            };
        }

        state.transfers.insert(
            id.clone(),
            MemoryTransfer {
                metadata: metadata.clone(),
                resolved,
                metrics: LiveMetrics::default(),
            },
        );
        state.order.push(id.clone());
        tracing::debug!(job_id = %id, resolved, "Memory engine admitted transfer");

        AddedTransfer {
            id,
            metadata,
            resolved,
        }
    }

    /// Script the metrics the next samples of `id` will report
    pub fn set_metrics(&self, id: &str, metrics: LiveMetrics) -> bool {
        match self.write().transfers.get_mut(id) {
            Some(transfer) => {
                transfer.metrics = metrics;
                true
            }
            None => false,
        }
    }

    /// Simulate the engine finishing metadata resolution for `id`
    pub fn resolve(&self, id: &str, metadata: JobMetadata) -> bool {
        match self.write().transfers.get_mut(id) {
            Some(transfer) => {
                transfer.metadata = metadata;
                transfer.resolved = true;
                true
            }
            None => false,
        }
    }

    /// Make sampling of `id` fail until cleared
    pub fn fail_sampling(&self, id: &str, failing: bool) {
        let mut state = self.write();
        if failing {
            state.failing_samples.insert(id.to_string());
        } else {
            state.failing_samples.remove(id);
        }
    }

    /// Make every destroy call fail with `message` until cleared with `None`
    pub fn reject_destroy(&self, message: Option<&str>) {
        self.write().reject_destroy = message.map(str::to_string);
    }

    pub fn contains(&self, id: &str) -> bool {
        self.read().transfers.contains_key(id)
    }

    /// Ids passed to a successful destroy, in call order
    pub fn destroyed(&self) -> Vec<JobId> {
        self.read().destroyed.clone()
    }
}

#[async_trait]
impl TransferEngine for MemoryEngine {
    async fn add_from_blob(&self, blob: Vec<u8>) -> Result<AddedTransfer, EngineError> {
        if blob.is_empty() {
            return Err(EngineError::Rejected("empty torrent file".to_string()));
        }

        let id = blob_content_id(&blob);
        let (metadata, resolved) = match scan_torrent_metadata(&blob) {
            Some(metadata) => (metadata, true),
            None => (JobMetadata::pending(None), false),
        };
        Ok(self.admit(id, metadata, resolved))
    }

    async fn add_from_identifier(&self, uri: &str) -> Result<AddedTransfer, EngineError> {
        let magnet = parse_magnet(uri)?;
        let metadata = JobMetadata {
            total_size: magnet.exact_length.unwrap_or(0),
            ..JobMetadata::pending(magnet.display_name)
        };
        Ok(self.admit(magnet.info_hash, metadata, false))
    }

    async fn list_active(&self) -> Result<Vec<JobId>, EngineError> {
        Ok(self.read().order.clone())
    }

    async fn sample(&self, id: &str) -> Result<EngineSample, EngineError> {
        let state = self.read();
        if state.failing_samples.contains(id) {
            return Err(EngineError::Rejected(format!("sampling {} failed", id)));
        }
        let transfer = state
            .transfers
            .get(id)
            .ok_or_else(|| EngineError::UnknownJob(id.to_string()))?;

        Ok(EngineSample {
            metrics: transfer.metrics.clone(),
            metadata: transfer.resolved.then(|| transfer.metadata.clone()),
        })
    }

    async fn destroy(&self, id: &str) -> Result<(), EngineError> {
        let mut state = self.write();
        if let Some(message) = &state.reject_destroy {
            return Err(EngineError::Rejected(message.clone()));
        }
        if state.transfers.remove(id).is_none() {
            return Err(EngineError::UnknownJob(id.to_string()));
        }
        state.order.retain(|existing| existing != id);
        state.failing_samples.remove(id);
        state.destroyed.push(id.to_string());
        tracing::debug!(job_id = %id, "Memory engine destroyed transfer");
        Ok(())
    }
}

fn blob_content_id(blob: &[u8]) -> JobId {
    let digest = Sha256::digest(blob);
    let mut id = hex::encode(digest);
    id.truncate(CONTENT_ID_LEN);
    id
}

/// Fields pulled out of a magnet link
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MagnetLink {
    pub info_hash: String,
    pub display_name: Option<String>,
    pub exact_length: Option<u64>,
}

/// Parse `magnet:?xt=urn:btih:<hash>&dn=<name>&xl=<bytes>`
pub fn parse_magnet(uri: &str) -> Result<MagnetLink, EngineError> {
    let url = url::Url::parse(uri)
        .map_err(|e| EngineError::Rejected(format!("invalid magnet URI: {}", e)))?;
    if url.scheme() != "magnet" {
        return Err(EngineError::Rejected(format!(
            "unsupported scheme: {}",
            url.scheme()
        )));
    }

    let mut info_hash = None;
    let mut display_name = None;
    let mut exact_length = None;
    for (key, value) in url.query_pairs() {
        match key.as_ref() {
            "xt" => {
                if let Some(hash) = value.strip_prefix("urn:btih:") {
                    info_hash = Some(hash.to_ascii_lowercase());
                }
            }
            "dn" => display_name = Some(value.into_owned()),
            "xl" => exact_length = value.parse().ok(),
            _ => {}
        }
    }

    let info_hash = info_hash
        .filter(|hash| !hash.is_empty())
        .ok_or_else(|| EngineError::Rejected("magnet URI has no btih hash".to_string()))?;

    Ok(MagnetLink {
        info_hash,
        display_name,
        exact_length,
    })
}

/// Pull name, total length and file count out of a bencoded torrent.
///
/// A shallow scan rather than a full decoder: `4:name` gives the name, every
/// `6:length` integer is one file.
fn scan_torrent_metadata(blob: &[u8]) -> Option<JobMetadata> {
    let name = find(blob, b"4:name").and_then(|pos| read_bytestring(&blob[pos + 6..]))?;

    let mut total_size = 0u64;
    let mut file_count = 0u32;
    let mut cursor = 0;
    while let Some(pos) = find(&blob[cursor..], b"6:length") {
        let start = cursor + pos + 8;
        if let Some(length) = read_integer(&blob[start..]) {
            total_size = total_size.saturating_add(length);
            file_count += 1;
        }
        cursor = start;
    }

    if file_count == 0 {
        return None;
    }
    Some(JobMetadata::new(name, total_size, file_count))
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

/// `<len>:<bytes>`
fn read_bytestring(data: &[u8]) -> Option<String> {
    let colon = data.iter().position(|&b| b == b':')?;
    let len: usize = std::str::from_utf8(&data[..colon]).ok()?.parse().ok()?;
    let body = data.get(colon + 1..)?.get(..len)?;
    Some(String::from_utf8_lossy(body).into_owned())
}

/// `i<digits>e`
fn read_integer(data: &[u8]) -> Option<u64> {
    let rest = data.strip_prefix(b"i")?;
    let end = rest.iter().position(|&b| b == b'e')?;
    std::str::from_utf8(&rest[..end]).ok()?.parse().ok()
}
