//! Error types for the Seedkeeper core

use thiserror::Error;

pub type Result<T> = std::result::Result<T, CoreError>;

/// Failures reported to callers of the core.
///
/// None of these are fatal to the process. Disk probe failures never show up
/// here: the probe degrades to a zeroed snapshot instead.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoreError {
    #[error("Job not found: {0}")]
    NotFound(String),

    #[error("Access denied to job {job_id} for {username}")]
    AccessDenied { job_id: String, username: String },

    #[error("Job already tracked: {0}")]
    DuplicateJob(String),

    #[error("Engine failure: {0}")]
    Engine(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

/// Errors raised by a transfer engine implementation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    #[error("engine rejected request: {0}")]
    Rejected(String),

    #[error("unknown job: {0}")]
    UnknownJob(String),

    #[error("engine did not answer within {0} ms")]
    Timeout(u64),
}

impl From<EngineError> for CoreError {
    fn from(err: EngineError) -> Self {
        CoreError::Engine(err.to_string())
    }
}

impl CoreError {
    /// Short machine-readable kind, used in API payloads and logs
    pub fn kind(&self) -> &'static str {
        match self {
            CoreError::NotFound(_) => "not_found",
            CoreError::AccessDenied { .. } => "access_denied",
            CoreError::DuplicateJob(_) => "duplicate_job",
            CoreError::Engine(_) => "engine_failure",
            CoreError::InvalidInput(_) => "invalid_input",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_error_converts_with_message() {
        let err: CoreError = EngineError::Rejected("bad torrent".to_string()).into();
        assert_eq!(err.kind(), "engine_failure");
        assert!(err.to_string().contains("bad torrent"));
    }

    #[test]
    fn test_access_denied_display() {
        let err = CoreError::AccessDenied {
            job_id: "abc".to_string(),
            username: "bob".to_string(),
        };
        assert_eq!(err.to_string(), "Access denied to job abc for bob");
    }
}
