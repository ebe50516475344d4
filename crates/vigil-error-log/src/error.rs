use std::path::PathBuf;
use thiserror::Error;

/// Errors from the error log and its alert sinks.
#[derive(Debug, Error)]
pub enum ErrorLogError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to serialize log entry: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Webhook delivery failed: {0}")]
    Webhook(#[from] reqwest::Error),
}

impl ErrorLogError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

pub type ErrorLogResult<T> = Result<T, ErrorLogError>;
