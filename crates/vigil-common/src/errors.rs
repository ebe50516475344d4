//! Error types shared by the vigil crates.
//!
//! Process-level failures are reported through [`ProcessError`]. Every
//! variant carries the id of the thing it concerns (a service name, a pid,
//! a marker path) so log lines stay meaningful without extra context.

use thiserror::Error;

/// Result alias for process operations.
pub type ProcessResult<T> = std::result::Result<T, ProcessError>;

/// Errors raised while controlling a supervised process.
#[derive(Debug, Error)]
pub enum ProcessError {
    /// The target process does not exist.
    #[error("Process not found: {id}")]
    NotFound { id: String },

    /// The OS refused to spawn the process.
    #[error("Process spawn failed: {id} - {reason}")]
    SpawnFailed { id: String, reason: String },

    /// The process spawned but did not survive its settle window.
    #[error("Process start failed: {id} - {reason}")]
    StartFailed { id: String, reason: String },

    /// The production build that precedes a rebuilt start failed.
    #[error("Build failed: {id} - {reason}")]
    BuildFailed { id: String, reason: String },

    /// Signal delivery or reaping failed.
    #[error("Process stop failed: {id} - {reason}")]
    StopFailed { id: String, reason: String },

    /// Invalid or unusable configuration.
    #[error("Process configuration error: {id} - {reason}")]
    Configuration { id: String, reason: String },

    /// I/O failure while touching process state on disk.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ProcessError {
    pub fn not_found(id: impl Into<String>) -> Self {
        Self::NotFound { id: id.into() }
    }

    pub fn spawn_failed(id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::SpawnFailed {
            id: id.into(),
            reason: reason.into(),
        }
    }

    pub fn start_failed(id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::StartFailed {
            id: id.into(),
            reason: reason.into(),
        }
    }

    pub fn build_failed(id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::BuildFailed {
            id: id.into(),
            reason: reason.into(),
        }
    }

    pub fn stop_failed(id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::StopFailed {
            id: id.into(),
            reason: reason.into(),
        }
    }

    pub fn configuration(id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Configuration {
            id: id.into(),
            reason: reason.into(),
        }
    }

    /// True for failures of a production build, which must not be retried
    /// straight away.
    pub fn is_build_failure(&self) -> bool {
        matches!(self, Self::BuildFailed { .. })
    }
}
