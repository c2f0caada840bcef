/*!
 * Configuration for the Seedkeeper binary
 *
 * Settings come from an optional TOML file, then environment overrides, then
 * command-line flags (applied by `main`).
 */

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{Result, SeedkeeperError};
use seedkeeper_core::TelemetryConfig;
use seedkeeper_server::{AuthConfig, ServerConfig};

pub const ENV_JWT_SECRET: &str = "SEEDKEEPER_JWT_SECRET";
pub const ENV_ADMIN_USERNAME: &str = "SEEDKEEPER_ADMIN_USERNAME";
pub const ENV_ADMIN_PASSWORD: &str = "SEEDKEEPER_ADMIN_PASSWORD";
pub const ENV_PORT: &str = "PORT";

/// Legacy names still honoured when the `SEEDKEEPER_*` variable is unset
pub const LEGACY_ENV_JWT_SECRET: &str = "SESSION_SECRET";
pub const LEGACY_ENV_ADMIN_USERNAME: &str = "ADMIN_USERNAME";
pub const LEGACY_ENV_ADMIN_PASSWORD: &str = "ADMIN_PASSWORD";

/// Top-level configuration file layout
///
/// ```toml
/// [server]
/// port = 8080
///
/// [telemetry]
/// monthly_cap_bytes = 53687091200
///
/// [logging]
/// log_level = "debug"
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub auth: AuthConfig,
    pub telemetry: TelemetryConfig,
    pub logging: LoggingConfig,
}

/// Diagnostic output settings
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub log_level: LogLevel,

    /// Log file path (None = stdout)
    pub log_file: Option<PathBuf>,

    /// Shorthand for log_level = debug
    pub verbose: bool,
}

/// Log level for diagnostic output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    /// Convert to tracing::Level
    pub fn to_tracing_level(&self) -> tracing::Level {
        match self {
            LogLevel::Error => tracing::Level::ERROR,
            LogLevel::Warn => tracing::Level::WARN,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Trace => tracing::Level::TRACE,
        }
    }
}

impl std::str::FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "error" => Ok(LogLevel::Error),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "info" => Ok(LogLevel::Info),
            "debug" => Ok(LogLevel::Debug),
            "trace" => Ok(LogLevel::Trace),
            other => Err(format!("unknown log level '{}'", other)),
        }
    }
}

impl AppConfig {
    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents =
            std::fs::read_to_string(path).map_err(|source| SeedkeeperError::ConfigRead {
                path: path.to_path_buf(),
                source,
            })?;
        toml::from_str(&contents).map_err(|e| SeedkeeperError::ConfigParse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    /// Load from `path` when given, otherwise start from defaults, then apply
    /// process environment overrides
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Apply overrides from an environment lookup
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let lookup_either =
            |primary: &str, legacy: &str| lookup(primary).or_else(|| lookup(legacy));

        if let Some(secret) = lookup_either(ENV_JWT_SECRET, LEGACY_ENV_JWT_SECRET) {
            self.auth.jwt_secret = secret;
        }
        if let Some(username) = lookup_either(ENV_ADMIN_USERNAME, LEGACY_ENV_ADMIN_USERNAME) {
            self.auth.admin_username = username;
        }
        if let Some(password) = lookup_either(ENV_ADMIN_PASSWORD, LEGACY_ENV_ADMIN_PASSWORD) {
            self.auth.admin_password = password;
        }
        if let Some(port) = lookup(ENV_PORT) {
            self.server.port = port
                .trim()
                .parse()
                .map_err(|_| SeedkeeperError::Config(format!("{} is not a port: {}", ENV_PORT, port)))?;
        }
        Ok(())
    }

    /// Reject settings the server cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.auth.jwt_secret.is_empty() {
            return Err(SeedkeeperError::Config("jwt_secret must not be empty".into()));
        }
        if self.auth.admin_username.trim().is_empty() || self.auth.admin_password.is_empty() {
            return Err(SeedkeeperError::Config(
                "admin credentials must not be empty".into(),
            ));
        }
        if self.auth.token_ttl_hours <= 0 {
            return Err(SeedkeeperError::Config(
                "token_ttl_hours must be positive".into(),
            ));
        }
        if self.telemetry.monthly_cap_bytes == 0 {
            return Err(SeedkeeperError::Config(
                "monthly_cap_bytes must be positive".into(),
            ));
        }
        if self.telemetry.recent_limit == 0 {
            return Err(SeedkeeperError::Config("recent_limit must be positive".into()));
        }
        Ok(())
    }

    /// Effective level after the verbose shorthand
    pub fn effective_log_level(&self) -> tracing::Level {
        if self.logging.verbose {
            tracing::Level::DEBUG
        } else {
            self.logging.log_level.to_tracing_level()
        }
    }
}
