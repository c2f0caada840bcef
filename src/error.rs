/*!
 * Error types for the Seedkeeper binary
 */

use std::io;
use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, SeedkeeperError>;

/// Exit code constants for structured process exit
pub const EXIT_SUCCESS: i32 = 0;
pub const EXIT_RUNTIME: i32 = 1;
pub const EXIT_FATAL: i32 = 2;

#[derive(Error, Debug)]
pub enum SeedkeeperError {
    #[error("Failed to read config file {path}: {source}")]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Invalid config file {path}: {message}")]
    ConfigParse { path: PathBuf, message: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Server error: {0:#}")]
    Server(#[from] anyhow::Error),
}

impl SeedkeeperError {
    /// Get the process exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            SeedkeeperError::ConfigRead { .. }
            | SeedkeeperError::ConfigParse { .. }
            | SeedkeeperError::Config(_) => EXIT_FATAL,
            SeedkeeperError::Io(_) | SeedkeeperError::Server(_) => EXIT_RUNTIME,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_errors_are_fatal() {
        assert_eq!(
            SeedkeeperError::Config("port must not be 0".into()).exit_code(),
            EXIT_FATAL
        );
        assert_eq!(
            SeedkeeperError::Server(anyhow::anyhow!("bind failed")).exit_code(),
            EXIT_RUNTIME
        );
    }
}
