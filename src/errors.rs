use thiserror::Error;
use vigil_common::ProcessError;
use vigil_error_log::ErrorLogError;
use vigil_monitoring::HealthCheckError;

/// Top-level error for the vigil binaries.
#[derive(Error, Debug)]
pub enum VigilError {
    #[error("Configuration error: {0}")]
    Config(#[from] anyhow::Error),

    #[error("Process error: {0}")]
    Process(#[from] ProcessError),

    #[error("Health probe error: {0}")]
    Health(#[from] HealthCheckError),

    #[error("Error log error: {0}")]
    ErrorLog(#[from] ErrorLogError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Logging setup failed: {0}")]
    Logging(String),
}

pub type Result<T> = std::result::Result<T, VigilError>;
