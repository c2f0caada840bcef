/*!
 * Logging and tracing initialization
 */

use std::fs::File;
use std::path::Path;
use tracing::Level;
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

use crate::config::AppConfig;
use crate::error::{Result, SeedkeeperError};

/// Crate targets covered by the default filter
const TARGETS: [&str; 3] = ["seedkeeper", "seedkeeper_core", "seedkeeper_server"];

fn default_directives(level: Level) -> String {
    let mut directives: Vec<String> = TARGETS
        .iter()
        .map(|target| format!("{}={}", target, level))
        .collect();
    directives.push("tower_http=info".to_string());
    directives.join(",")
}

/// Initialize structured logging based on configuration
///
/// `RUST_LOG` takes precedence over the configured level.
pub fn init_logging(config: &AppConfig) -> Result<()> {
    let level = config.effective_log_level();

    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_directives(level)))
        .map_err(|e| SeedkeeperError::Config(format!("Failed to create log filter: {}", e)))?;

    if let Some(ref log_path) = config.logging.log_file {
        init_file_logging(log_path, env_filter)?;
    } else {
        init_stdout_logging(env_filter);
    }

    Ok(())
}

fn init_stdout_logging(env_filter: EnvFilter) {
    let fmt_layer = fmt::layer()
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .with_span_events(FmtSpan::NONE)
        .compact();

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .init();
}

/// JSON lines, one event per line
fn init_file_logging(log_path: &Path, env_filter: EnvFilter) -> Result<()> {
    let file = File::create(log_path)
        .map_err(|e| SeedkeeperError::Config(format!("Failed to create log file: {}", e)))?;

    let fmt_layer = fmt::layer()
        .with_writer(file)
        .with_target(true)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_ansi(false)
        .json();

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .init();

    Ok(())
}

#[cfg(test)]
pub fn init_test_logging() {
    use std::sync::Once;
    static INIT: Once = Once::new();

    INIT.call_once(|| {
        let env_filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(default_directives(Level::DEBUG)));

        let fmt_layer = fmt::layer().with_test_writer().with_target(false).compact();

        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt_layer)
            .try_init()
            .ok();
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_directives_cover_workspace() {
        let directives = default_directives(Level::WARN);
        assert!(directives.contains("seedkeeper=WARN"));
        assert!(directives.contains("seedkeeper_core=WARN"));
        assert!(directives.contains("seedkeeper_server=WARN"));
        assert!(EnvFilter::try_new(directives).is_ok());
    }

    #[test]
    fn test_unwritable_log_file_is_config_error() {
        init_test_logging();
        let err = init_file_logging(
            Path::new("/nonexistent/dir/seedkeeper.log"),
            EnvFilter::new("seedkeeper=info"),
        )
        .unwrap_err();
        assert!(matches!(err, SeedkeeperError::Config(_)));
    }
}
