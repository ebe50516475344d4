//! # Vigil Error Log
//!
//! Durable error logging with alerting for the vigil supervisor.
//!
//! This crate provides:
//! - Structured log entries in human-readable and JSON-lines form
//! - Size-based rotation with bounded retention
//! - Occurrence counting per error fingerprint
//! - Threshold alerts to console, file and webhook sinks
//! - Capture of the managed service's output

pub mod alert;
pub mod capture;
pub mod entry;
pub mod error;
pub mod fingerprint;
pub mod logger;
pub mod rotation;
pub mod store;

pub use alert::{default_thresholds, render_alert, AlertChannels, AlertGate};
pub use capture::ServiceOutput;
pub use entry::{Category, LogEntry, LogOptions, Severity};
pub use error::{ErrorLogError, ErrorLogResult};
pub use fingerprint::{Occurrence, OccurrenceTracker};
pub use logger::{ErrorLogger, LogOutcome};
pub use rotation::{rotate_if_needed, RotatingFileWriter, RotationPolicy};
pub use store::{ErrorStats, LogPaths, LogStore};

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

/// Error log configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorLogConfig {
    #[serde(default = "default_thresholds")]
    pub alert_thresholds: HashMap<Severity, u32>,

    #[serde(default)]
    pub rotation: RotationPolicy,

    /// Rolling window for occurrence counting.
    #[serde(default = "default_dedup_window_secs")]
    pub dedup_window_secs: u64,

    #[serde(default)]
    pub alerts: AlertChannels,
}

/// Longest accepted occurrence window: one year.
pub const MAX_DEDUP_WINDOW_SECS: u64 = 365 * 24 * 60 * 60;

fn default_dedup_window_secs() -> u64 {
    fingerprint::DEFAULT_WINDOW_SECS as u64
}

impl Default for ErrorLogConfig {
    fn default() -> Self {
        Self {
            alert_thresholds: default_thresholds(),
            rotation: RotationPolicy::default(),
            dedup_window_secs: default_dedup_window_secs(),
            alerts: AlertChannels::default(),
        }
    }
}

impl ErrorLogConfig {
    /// Store writing `errors.log` and `errors.json` inside `log_dir`.
    pub fn store(&self, log_dir: &Path) -> LogStore {
        LogStore::new(LogPaths::in_dir(log_dir), self.rotation)
    }

    /// Occurrence window, capped at [`MAX_DEDUP_WINDOW_SECS`].
    pub fn dedup_window(&self) -> chrono::Duration {
        let secs = self.dedup_window_secs.min(MAX_DEDUP_WINDOW_SECS);
        chrono::Duration::seconds(secs as i64)
    }

    /// Gate appending to `alerts.log` inside `log_dir`.
    pub fn alert_gate(&self, log_dir: &Path) -> AlertGate {
        AlertGate::new(
            self.alert_thresholds.clone(),
            self.alerts.clone(),
            LogPaths::in_dir(log_dir).alert_log,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = ErrorLogConfig::default();
        assert_eq!(config.alert_thresholds.get(&Severity::Error), Some(&10));
        assert_eq!(config.alert_thresholds.get(&Severity::Fatal), Some(&1));
        assert_eq!(config.rotation.max_size_bytes, 10 * 1024 * 1024);
        assert_eq!(config.rotation.max_rotated_files, 5);
        assert_eq!(config.dedup_window_secs, 3600);
        assert_eq!(config.dedup_window(), chrono::Duration::hours(1));
    }

    #[test]
    fn test_huge_dedup_window_is_capped() {
        let config = ErrorLogConfig {
            dedup_window_secs: u64::MAX,
            ..ErrorLogConfig::default()
        };
        assert_eq!(config.dedup_window(), chrono::Duration::days(365));
    }

    #[test]
    fn test_config_from_json_overrides() {
        let config: ErrorLogConfig = serde_json::from_str(
            r#"{"alert_thresholds":{"ERROR":3},"alerts":{"console":false}}"#,
        )
        .unwrap();
        assert_eq!(config.alert_thresholds.get(&Severity::Error), Some(&3));
        assert_eq!(config.alert_thresholds.get(&Severity::Fatal), None);
        assert!(!config.alerts.console);
        assert!(config.alerts.file);
        assert_eq!(config.rotation, RotationPolicy::default());
    }
}
