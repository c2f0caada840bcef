//! Disk probe: best-effort capacity telemetry for the working volume
//!
//! Capacity is read by running the platform's own reporting command
//! (`df` on POSIX, `wmic` on Windows) and parsing its first data row.
//! Every failure mode (spawn error, non-zero exit, unparsable output,
//! timeout) degrades to an all-zero snapshot. Nothing here is ever
//! surfaced to callers as an error.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Capacity of the working volume at one point in time
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct DiskSnapshot {
    pub total_bytes: u64,
    pub used_bytes: u64,
    pub free_bytes: u64,
    /// 0 ..= 100, 0 when total is 0
    pub used_percent: f64,
}

impl DiskSnapshot {
    pub fn zeroed() -> Self {
        Self::default()
    }

    pub fn from_parts(total_bytes: u64, used_bytes: u64, free_bytes: u64) -> Self {
        let used_percent = if total_bytes > 0 {
            ((used_bytes as f64 / total_bytes as f64) * 100.0).clamp(0.0, 100.0)
        } else {
            0.0
        };
        Self {
            total_bytes,
            used_bytes,
            free_bytes,
            used_percent,
        }
    }
}

/// Why a probe fell back to zeros. Only ever logged.
#[derive(Error, Debug)]
pub enum ProbeError {
    #[error("failed to run {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{program} exited with {status}")]
    Status { program: String, status: String },

    #[error("unexpected output: {0}")]
    Parse(String),

    #[error("probe timed out after {0:?}")]
    Timeout(Duration),
}

/// Executes a capacity command and returns its stdout
#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run(&self, program: &str, args: &[String]) -> Result<String, ProbeError>;
}

/// Runs commands on the host via `tokio::process`
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemCommandRunner;

#[async_trait]
impl CommandRunner for SystemCommandRunner {
    async fn run(&self, program: &str, args: &[String]) -> Result<String, ProbeError> {
        let output = tokio::process::Command::new(program)
            .args(args)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|source| ProbeError::Spawn {
                program: program.to_string(),
                source,
            })?;

        if !output.status.success() {
            return Err(ProbeError::Status {
                program: program.to_string(),
                status: output.status.to_string(),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

/// Which capacity command dialect to use
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    /// GNU df, byte-sized blocks
    Linux,
    /// BSD / macOS df, kilobyte blocks
    Unix,
    /// wmic logicaldisk
    Windows,
}

impl Platform {
    pub fn current() -> Self {
        if cfg!(windows) {
            Platform::Windows
        } else if cfg!(target_os = "linux") {
            Platform::Linux
        } else {
            Platform::Unix
        }
    }

    fn command(&self, path: &str) -> (&'static str, Vec<String>) {
        match self {
            Platform::Linux => ("df", vec!["-P".into(), "-B1".into(), path.to_string()]),
            Platform::Unix => ("df", vec!["-P".into(), "-k".into(), path.to_string()]),
            Platform::Windows => (
                "wmic",
                vec![
                    "logicaldisk".into(),
                    "where".into(),
                    "size!=0".into(),
                    "get".into(),
                    "size,freespace,caption".into(),
                ],
            ),
        }
    }

    fn parse(&self, output: &str) -> Result<DiskSnapshot, ProbeError> {
        match self {
            Platform::Linux => parse_df(output, 1),
            Platform::Unix => parse_df(output, 1024),
            Platform::Windows => parse_wmic(output),
        }
    }
}

/// Probes the volume holding `path`
#[derive(Clone)]
pub struct DiskProbe {
    path: PathBuf,
    platform: Platform,
    timeout: Duration,
    runner: Arc<dyn CommandRunner>,
}

impl std::fmt::Debug for DiskProbe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiskProbe")
            .field("path", &self.path)
            .field("platform", &self.platform)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl DiskProbe {
    pub fn new(path: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self::with_runner(path, timeout, Platform::current(), Arc::new(SystemCommandRunner))
    }

    pub fn with_runner(
        path: impl Into<PathBuf>,
        timeout: Duration,
        platform: Platform,
        runner: Arc<dyn CommandRunner>,
    ) -> Self {
        Self {
            path: path.into(),
            platform,
            timeout,
            runner,
        }
    }

    /// Current capacity, or zeros if it could not be determined
    pub async fn probe(&self) -> DiskSnapshot {
        match self.try_probe().await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                tracing::warn!(path = %self.path.display(), "Disk probe failed: {}", e);
                DiskSnapshot::zeroed()
            }
        }
    }

    async fn try_probe(&self) -> Result<DiskSnapshot, ProbeError> {
        let path = self.path.to_string_lossy();
        let (program, args) = self.platform.command(&path);
        let output = tokio::time::timeout(self.timeout, self.runner.run(program, &args))
            .await
            .map_err(|_| ProbeError::Timeout(self.timeout))??;
        self.platform.parse(&output)
    }
}

/// Parse POSIX `df -P` output. Columns: filesystem, blocks, used, available.
pub fn parse_df(output: &str, block_size: u64) -> Result<DiskSnapshot, ProbeError> {
    let row = output
        .lines()
        .skip(1)
        .find(|line| !line.trim().is_empty())
        .ok_or_else(|| ProbeError::Parse("df printed no data row".to_string()))?;

    let parts: Vec<&str> = row.split_whitespace().collect();
    if parts.len() < 4 {
        return Err(ProbeError::Parse(format!("short df row: {:?}", row)));
    }

    let total = parse_column(parts[1])?.saturating_mul(block_size);
    let used = parse_column(parts[2])?.saturating_mul(block_size);
    let free = parse_column(parts[3])?.saturating_mul(block_size);
    Ok(DiskSnapshot::from_parts(total, used, free))
}

/// Parse `wmic logicaldisk get size,freespace,caption`.
/// Columns come back alphabetised: Caption, FreeSpace, Size.
pub fn parse_wmic(output: &str) -> Result<DiskSnapshot, ProbeError> {
    let row = output
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty() && !line.contains("Caption"))
        .ok_or_else(|| ProbeError::Parse("wmic printed no data row".to_string()))?;

    let parts: Vec<&str> = row.split_whitespace().collect();
    if parts.len() < 3 {
        return Err(ProbeError::Parse(format!("short wmic row: {:?}", row)));
    }

    let free = parse_column(parts[1])?;
    let total = parse_column(parts[2])?;
    Ok(DiskSnapshot::from_parts(total, total.saturating_sub(free), free))
}

fn parse_column(value: &str) -> Result<u64, ProbeError> {
    value
        .parse::<u64>()
        .map_err(|_| ProbeError::Parse(format!("not a number: {:?}", value)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct ScriptedRunner {
        response: Mutex<Option<Result<String, ProbeError>>>,
        seen: Mutex<Vec<(String, Vec<String>)>>,
    }

    impl ScriptedRunner {
        fn returning(response: Result<String, ProbeError>) -> Arc<Self> {
            Arc::new(Self {
                response: Mutex::new(Some(response)),
                seen: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl CommandRunner for ScriptedRunner {
        async fn run(&self, program: &str, args: &[String]) -> Result<String, ProbeError> {
            self.seen
                .lock()
                .unwrap()
                .push((program.to_string(), args.to_vec()));
            self.response
                .lock()
                .unwrap()
                .take()
                .unwrap_or_else(|| Err(ProbeError::Parse("no response".to_string())))
        }
    }

    struct HangingRunner;

    #[async_trait]
    impl CommandRunner for HangingRunner {
        async fn run(&self, _program: &str, _args: &[String]) -> Result<String, ProbeError> {
            std::future::pending().await
        }
    }

    const GNU_DF: &str = "Filesystem        1-blocks        Used   Available Capacity Mounted on\n\
                          /dev/nvme0n1p2 1000000000000 250000000000 750000000000      25% /\n";

    #[test]
    fn test_parse_gnu_df() {
        let snapshot = parse_df(GNU_DF, 1).unwrap();
        assert_eq!(snapshot.total_bytes, 1_000_000_000_000);
        assert_eq!(snapshot.used_bytes, 250_000_000_000);
        assert_eq!(snapshot.free_bytes, 750_000_000_000);
        assert!((snapshot.used_percent - 25.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_parse_bsd_df_scales_kilobytes() {
        let output = "Filesystem 1024-blocks Used Available Capacity Mounted on\n\
                      /dev/disk3s1 1000 400 600 40% /\n";
        let snapshot = parse_df(output, 1024).unwrap();
        assert_eq!(snapshot.total_bytes, 1000 * 1024);
        assert_eq!(snapshot.used_bytes, 400 * 1024);
        assert_eq!(snapshot.free_bytes, 600 * 1024);
    }

    #[test]
    fn test_parse_wmic() {
        let output = "Caption  FreeSpace     Size\r\n\
                      C:       60000000000   240000000000\r\n\
                      D:       10            20\r\n";
        let snapshot = parse_wmic(output).unwrap();
        assert_eq!(snapshot.total_bytes, 240_000_000_000);
        assert_eq!(snapshot.free_bytes, 60_000_000_000);
        assert_eq!(snapshot.used_bytes, 180_000_000_000);
        assert!((snapshot.used_percent - 75.0).abs() < 1e-9);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(parse_df("Filesystem\n", 1).is_err());
        assert!(parse_df("header\n/dev/sda one two three\n", 1).is_err());
        assert!(parse_wmic("").is_err());
    }

    #[test]
    fn test_zero_total_has_zero_percent() {
        let snapshot = DiskSnapshot::from_parts(0, 0, 0);
        assert_eq!(snapshot.used_percent, 0.0);
    }

    #[tokio::test]
    async fn test_probe_uses_platform_command() {
        let runner = ScriptedRunner::returning(Ok(GNU_DF.to_string()));
        let probe = DiskProbe::with_runner(
            "/srv/seeds",
            Duration::from_secs(1),
            Platform::Linux,
            runner.clone(),
        );

        let snapshot = probe.probe().await;
        assert_eq!(snapshot.total_bytes, 1_000_000_000_000);

        let seen = runner.seen.lock().unwrap();
        assert_eq!(seen[0].0, "df");
        assert_eq!(seen[0].1, vec!["-P", "-B1", "/srv/seeds"]);
    }

    #[tokio::test]
    async fn test_command_failure_yields_zero_snapshot() {
        let runner = ScriptedRunner::returning(Err(ProbeError::Spawn {
            program: "df".to_string(),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "missing"),
        }));
        let probe = DiskProbe::with_runner(".", Duration::from_secs(1), Platform::Linux, runner);

        assert_eq!(probe.probe().await, DiskSnapshot::zeroed());
    }

    #[tokio::test]
    async fn test_unparsable_output_yields_zero_snapshot() {
        let runner = ScriptedRunner::returning(Ok("nonsense".to_string()));
        let probe = DiskProbe::with_runner(".", Duration::from_secs(1), Platform::Windows, runner);

        assert_eq!(probe.probe().await, DiskSnapshot::zeroed());
    }

    #[tokio::test(start_paused = true)]
    async fn test_hanging_command_times_out_to_zero() {
        let probe = DiskProbe::with_runner(
            ".",
            Duration::from_millis(200),
            Platform::Linux,
            Arc::new(HangingRunner),
        );

        assert_eq!(probe.probe().await, DiskSnapshot::zeroed());
    }
}
