//! Telemetry configuration: cadences, quota cap and collaborator timeouts

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// 100 GiB monthly egress allowance
pub const DEFAULT_MONTHLY_CAP_BYTES: u64 = 100 * 1024 * 1024 * 1024;

/// Settings for the sampler, the viewer push loops and the stats queries
///
/// # Example
///
/// ```
/// use seedkeeper_core::config::TelemetryConfig;
///
/// let config = TelemetryConfig::default();
/// assert_eq!(config.sample_interval().as_secs(), 2);
/// assert_eq!(config.client_poll_secs, 5);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetryConfig {
    /// Live metric cadence: engine sampling and viewer pushes
    pub sample_interval_secs: u64,

    /// Poll cadence advertised to clients that do not hold a push channel
    pub client_poll_secs: u64,

    /// Monthly upload allowance in bytes
    pub monthly_cap_bytes: u64,

    /// Size of the "recent jobs" view
    pub recent_limit: usize,

    /// Path whose volume the disk probe reports on
    pub disk_path: PathBuf,

    /// Upper bound for any single engine call
    pub engine_timeout_ms: u64,

    /// Upper bound for the disk capacity command
    pub probe_timeout_ms: u64,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            sample_interval_secs: 2,
            client_poll_secs: 5,
            monthly_cap_bytes: DEFAULT_MONTHLY_CAP_BYTES,
            recent_limit: 3,
            disk_path: PathBuf::from("."),
            engine_timeout_ms: 1500,
            probe_timeout_ms: 1500,
        }
    }
}

impl TelemetryConfig {
    pub fn sample_interval(&self) -> Duration {
        Duration::from_secs(self.sample_interval_secs.max(1))
    }

    pub fn client_poll_interval(&self) -> Duration {
        Duration::from_secs(self.client_poll_secs.max(1))
    }

    pub fn engine_timeout(&self) -> Duration {
        Duration::from_millis(self.engine_timeout_ms.max(1))
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms.max(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_intervals_are_clamped() {
        let config = TelemetryConfig {
            sample_interval_secs: 0,
            client_poll_secs: 0,
            engine_timeout_ms: 0,
            ..Default::default()
        };
        assert_eq!(config.sample_interval(), Duration::from_secs(1));
        assert_eq!(config.client_poll_interval(), Duration::from_secs(1));
        assert_eq!(config.engine_timeout(), Duration::from_millis(1));
    }

    #[test]
    fn test_default_cap_is_100_gib() {
        assert_eq!(
            TelemetryConfig::default().monthly_cap_bytes,
            107_374_182_400
        );
    }
}
