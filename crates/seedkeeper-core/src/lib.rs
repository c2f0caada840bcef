//! Seedkeeper core: the control plane of a multi-user seedbox
//!
//! The core tracks transfer jobs on behalf of authenticated viewers, samples
//! live metrics from a pluggable [`TransferEngine`], accounts monthly upload
//! traffic against a quota and reports host disk capacity. It knows nothing
//! about HTTP; the server crate maps requests onto [`Control`].
//!
//! # Architecture
//!
//! - [`registry::JobRegistry`]: authoritative job map, insertion ordered
//! - [`access`]: the single ownership/role gate for every per-job exposure
//! - [`ledger::TrafficLedger`]: daily/monthly/total counters with month rollover
//! - [`disk::DiskProbe`]: best-effort capacity query, zeros on failure
//! - [`sampler::Sampler`]: one process-wide task that pulls engine metrics
//! - [`session::SampleLoop`]: one push loop per connected viewer
//!
//! # Example
//!
//! ```no_run
//! use seedkeeper_core::{Control, MemoryEngine, TelemetryConfig, Viewer};
//! use std::sync::Arc;
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() -> seedkeeper_core::Result<()> {
//! let control = Control::new(Arc::new(MemoryEngine::new()), TelemetryConfig::default());
//! let cancel = CancellationToken::new();
//! let sampler = control.spawn_sampler(cancel.clone());
//!
//! let alice = Viewer::user("alice");
//! control
//!     .add_from_identifier(&alice, "magnet:?xt=urn:btih:c12fe1c06bba254a9dc9f519b335aa7c1367a88a")
//!     .await?;
//! let stats = control.stats(&alice).await;
//! println!("{} jobs, {} bytes left this month", stats.torrents.total, stats.quota.remaining);
//!
//! cancel.cancel();
//! let _ = sampler.await;
//! control.shutdown().await;
//! # Ok(())
//! # }
//! ```

pub mod access;
pub mod config;
pub mod control;
pub mod disk;
pub mod engine;
pub mod error;
pub mod job;
pub mod ledger;
pub mod registry;
pub mod sampler;
pub mod session;

pub use access::{Role, Viewer};
pub use config::TelemetryConfig;
pub use control::{ClientSettings, Control, StatsReport, ViewerSnapshot};
pub use disk::{DiskProbe, DiskSnapshot};
pub use engine::{AddedTransfer, EngineSample, MemoryEngine, TransferEngine};
pub use error::{CoreError, EngineError, Result};
pub use job::{Job, JobCounts, JobId, JobMetadata, JobStatus, LiveMetrics};
pub use ledger::{LedgerTotals, QuotaReport, TrafficLedger};
pub use registry::JobRegistry;
pub use sampler::{Sampler, TickReport};
pub use session::{LoopState, LoopSummary, SampleLoop, ViewerMessage};
