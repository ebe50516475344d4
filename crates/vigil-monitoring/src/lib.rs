//! # Vigil Monitoring
//!
//! Health probing for the supervised web service.
//!
//! A service is healthy when a process matching its launch signature exists
//! and its HTTP endpoint answers with a status below 400 within the timeout.

pub mod http;
pub mod prober;

pub use http::HttpProbe;
pub use prober::{HealthProbe, HealthProber};

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Why a probe declared the service unhealthy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnhealthyReason {
    ProcessNotRunning,
    NotResponding,
}

impl fmt::Display for UnhealthyReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ProcessNotRunning => f.write_str("process_not_running"),
            Self::NotResponding => f.write_str("not_responding"),
        }
    }
}

/// Outcome of one probe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthStatus {
    pub healthy: bool,
    pub reason: Option<UnhealthyReason>,
}

impl HealthStatus {
    pub fn healthy() -> Self {
        Self {
            healthy: true,
            reason: None,
        }
    }

    pub fn unhealthy(reason: UnhealthyReason) -> Self {
        Self {
            healthy: false,
            reason: Some(reason),
        }
    }
}

/// Health check specific errors
#[derive(Error, Debug)]
pub enum HealthCheckError {
    #[error("Health check timeout: {url}")]
    Timeout { url: String },

    #[error("Health check connection failed: {url} - {reason}")]
    ConnectionFailed { url: String, reason: String },

    #[error("Health check bad status: {url} - {status}")]
    BadStatus { url: String, status: u16 },

    #[error("Health check client setup failed: {reason}")]
    Client { reason: String },
}

pub type HealthCheckResult<T> = std::result::Result<T, HealthCheckError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reason_wire_names() {
        assert_eq!(UnhealthyReason::ProcessNotRunning.to_string(), "process_not_running");
        assert_eq!(UnhealthyReason::NotResponding.to_string(), "not_responding");
    }

    #[test]
    fn test_status_constructors() {
        assert!(HealthStatus::healthy().healthy);
        let down = HealthStatus::unhealthy(UnhealthyReason::NotResponding);
        assert!(!down.healthy);
        assert_eq!(down.reason, Some(UnhealthyReason::NotResponding));
    }
}
