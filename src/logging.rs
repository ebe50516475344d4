//! Tracing subscriber setup for the vigil binaries.
//!
//! Console output goes to stderr. When a log file is given, the same events
//! are also written without ANSI colours to that file through a
//! [`RotatingFileWriter`].

use crate::errors::{Result, VigilError};
use std::path::Path;
use std::sync::Mutex;
use tracing_subscriber::fmt;
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;
use vigil_error_log::{RotatingFileWriter, RotationPolicy};

/// `RUST_LOG` when set and valid, else `default_level`.
pub fn build_env_filter(default_level: &str) -> EnvFilter {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return filter;
    }
    EnvFilter::try_new(default_level.to_lowercase()).unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Install the global subscriber.
pub fn init(default_level: &str, log_file: Option<&Path>, policy: RotationPolicy) -> Result<()> {
    let console = fmt::layer().with_writer(std::io::stderr).with_target(false);

    let file = match log_file {
        Some(path) => {
            let writer = RotatingFileWriter::open(path, policy)?;
            Some(
                fmt::layer()
                    .with_writer(Mutex::new(writer))
                    .with_ansi(false)
                    .with_target(false),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(build_env_filter(default_level))
        .with(console)
        .with(file)
        .try_init()
        .map_err(|e| VigilError::Logging(e.to_string()))
}
