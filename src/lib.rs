/*!
 * Seedkeeper - multi-user seedbox control plane
 *
 * The binary wires configuration, logging and the transfer engine into the
 * `seedkeeper-server` HTTP/WebSocket surface. Domain logic lives in
 * `seedkeeper-core`.
 */

pub mod config;
pub mod error;
pub mod logging;

pub use config::{AppConfig, LogLevel, LoggingConfig};
pub use error::{Result, SeedkeeperError, EXIT_FATAL, EXIT_RUNTIME, EXIT_SUCCESS};

use seedkeeper_core::{Control, MemoryEngine};
use std::sync::Arc;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Build the control plane for `config` on top of the in-process engine
pub fn build_control(config: &AppConfig) -> Control {
    Control::new(Arc::new(MemoryEngine::new()), config.telemetry.clone())
}

/// Run the server on a fresh multi-threaded runtime until shutdown
pub fn serve(config: AppConfig) -> Result<()> {
    let runtime = tokio::runtime::Runtime::new()?;

    runtime.block_on(async move {
        let control = build_control(&config);
        seedkeeper_server::start_server(config.server, config.auth, control).await
    })?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert_eq!(VERSION, env!("CARGO_PKG_VERSION"));
    }

    #[test]
    fn test_build_control_uses_telemetry_settings() {
        let mut config = AppConfig::default();
        config.telemetry.client_poll_secs = 9;
        config.telemetry.recent_limit = 7;

        let settings = build_control(&config).settings();
        assert_eq!(settings.client_poll_secs, 9);
        assert_eq!(settings.recent_limit, 7);
    }
}
