//! Per-viewer push loop
//!
//! Each connected viewer owns one [`SampleLoop`]. It moves through
//! `Connected -> Sampling -> Closed`: on every tick it builds the viewer's
//! snapshot and offers it to the transport through a bounded channel. A full
//! channel means the transport is not writable right now, so the push is
//! dropped and the loop keeps ticking. A closed channel or a cancelled token
//! ends the loop.
//!
//! The loop only reads shared state. Engine sampling and traffic accounting
//! belong to the process-wide [`Sampler`](crate::sampler::Sampler).

use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use crate::access::Viewer;
use crate::control::{Control, ViewerSnapshot};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoopState {
    #[default]
    Connected,
    Sampling,
    Closed,
}

/// Messages pushed to a viewer, tagged by `type`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ViewerMessage {
    /// Full state refresh
    Update(ViewerSnapshot),
}

/// Counters and final state of a finished loop
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoopSummary {
    pub pushed: u64,
    pub skipped: u64,
    /// Always `Closed` once `run` has returned
    pub state: LoopState,
}

pub struct SampleLoop {
    control: Control,
    viewer: Viewer,
    interval: Duration,
    state: LoopState,
}

impl SampleLoop {
    pub fn new(control: Control, viewer: Viewer, interval: Duration) -> Self {
        Self {
            control,
            viewer,
            interval,
            state: LoopState::Connected,
        }
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    pub fn viewer(&self) -> &Viewer {
        &self.viewer
    }

    /// Push snapshots into `outbound` until it closes or `cancel` fires
    pub async fn run(
        mut self,
        outbound: mpsc::Sender<ViewerMessage>,
        cancel: CancellationToken,
    ) -> LoopSummary {
        let mut summary = LoopSummary::default();
        self.state = LoopState::Sampling;
        debug!(username = %self.viewer.username, "Viewer loop sampling");

        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }

            let snapshot = self.control.snapshot(&self.viewer).await;
            if cancel.is_cancelled() {
                break;
            }

            match outbound.try_send(ViewerMessage::Update(snapshot)) {
                Ok(()) => summary.pushed += 1,
                Err(TrySendError::Full(_)) => {
                    trace!(username = %self.viewer.username, "Transport busy, dropping update");
                    summary.skipped += 1;
                }
                Err(TrySendError::Closed(_)) => break,
            }
        }

        self.state = LoopState::Closed;
        summary.state = self.state;
        debug!(
            username = %self.viewer.username,
            pushed = summary.pushed,
            skipped = summary.skipped,
            "Viewer loop closed"
        );
        summary
    }
}
