//! Error logger facade: persist, count, alert.

use crate::alert::AlertGate;
use crate::entry::{hostname_from_env, Category, LogEntry, LogOptions, Severity};
use crate::fingerprint::OccurrenceTracker;
use crate::store::{ErrorStats, LogStore};
use crate::ErrorLogConfig;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing::warn;

/// What happened to a single log call.
#[derive(Debug, Clone)]
pub struct LogOutcome {
    pub entry: LogEntry,
    /// Occurrences of this fingerprint inside the rolling window, this one included.
    pub occurrences: u32,
    pub alerted: bool,
}

/// Records entries to the [`LogStore`] and raises alerts through the
/// [`AlertGate`].
///
/// Logging never fails from the caller's point of view: persistence and
/// alert delivery problems are reported through `tracing` and swallowed.
/// A fingerprint alerts at most once per window, on the first occurrence
/// that reaches its severity's threshold.
#[derive(Debug)]
pub struct ErrorLogger {
    store: Arc<LogStore>,
    gate: AlertGate,
    tracker: Mutex<OccurrenceTracker>,
    hostname: String,
    console_echo: bool,
}

impl ErrorLogger {
    pub fn new(store: LogStore, gate: AlertGate, tracker: OccurrenceTracker) -> Self {
        Self {
            store: Arc::new(store),
            gate,
            tracker: Mutex::new(tracker),
            hostname: hostname_from_env(),
            console_echo: true,
        }
    }

    pub fn from_config(config: &ErrorLogConfig, log_dir: &Path) -> Self {
        Self::new(
            config.store(log_dir),
            config.alert_gate(log_dir),
            OccurrenceTracker::new(config.dedup_window()),
        )
    }

    /// Disable the `[SEVERITY] message` echo on stderr. Used when the host
    /// process already mirrors these messages to the console.
    pub fn with_console_echo(mut self, echo: bool) -> Self {
        self.console_echo = echo;
        self
    }

    pub fn with_hostname(mut self, hostname: impl Into<String>) -> Self {
        self.hostname = hostname.into();
        self
    }

    pub fn store(&self) -> &LogStore {
        &self.store
    }

    pub async fn log(&self, message: impl Into<String>, options: LogOptions) -> LogOutcome {
        let entry = LogEntry::new(message, options, self.hostname.clone());
        let fingerprint = entry.fingerprint();

        let store = Arc::clone(&self.store);
        let record = entry.clone();
        match tokio::task::spawn_blocking(move || store.append(&record)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!("Failed to persist log entry: {}", e),
            Err(e) => warn!("Log write task failed: {}", e),
        }

        if self.console_echo && entry.severity.is_error() {
            eprintln!("[{}] {}", entry.severity, entry.message);
            if let Some(stack) = &entry.stack {
                eprintln!("{}", stack);
            }
        }

        let (occurrences, alert) = {
            let mut tracker = self
                .tracker
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            let occurrence = tracker.track(&fingerprint, entry.timestamp);
            let alert = !occurrence.alerted
                && self.gate.should_alert(entry.severity, occurrence.count);
            if alert {
                tracker.mark_alerted(&fingerprint);
            }
            (occurrence.count, alert)
        };

        if alert {
            self.gate.dispatch(&entry).await;
        }

        LogOutcome {
            entry,
            occurrences,
            alerted: alert,
        }
    }

    pub async fn log_debug(&self, message: impl Into<String>, category: Category) -> LogOutcome {
        self.log(message, LogOptions::new(Severity::Debug, category))
            .await
    }

    pub async fn log_info(&self, message: impl Into<String>, category: Category) -> LogOutcome {
        self.log(message, LogOptions::new(Severity::Info, category))
            .await
    }

    pub async fn log_warning(&self, message: impl Into<String>, category: Category) -> LogOutcome {
        self.log(message, LogOptions::new(Severity::Warn, category))
            .await
    }

    pub async fn log_error(&self, message: impl Into<String>, category: Category) -> LogOutcome {
        self.log(message, LogOptions::new(Severity::Error, category))
            .await
    }

    pub async fn log_fatal(&self, message: impl Into<String>, category: Category) -> LogOutcome {
        self.log(message, LogOptions::new(Severity::Fatal, category))
            .await
    }

    pub fn stats(&self, hours_back: u32) -> ErrorStats {
        self.store.query_stats(hours_back)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alert::{default_thresholds, AlertChannels};
    use crate::rotation::RotationPolicy;
    use crate::store::LogPaths;

    fn logger(dir: &Path) -> ErrorLogger {
        let paths = LogPaths::in_dir(dir);
        let gate = AlertGate::new(
            default_thresholds(),
            AlertChannels {
                console: false,
                file: true,
                webhook_url: None,
            },
            paths.alert_log.clone(),
        );
        ErrorLogger::new(
            LogStore::new(paths, RotationPolicy::default()),
            gate,
            OccurrenceTracker::default(),
        )
        .with_console_echo(false)
        .with_hostname("test-host")
    }

    fn alert_count(dir: &Path) -> usize {
        std::fs::read_to_string(dir.join("alerts.log"))
            .map(|s| s.matches("MetaBalance Error Alert").count())
            .unwrap_or(0)
    }

    #[tokio::test]
    async fn test_repeated_error_alerts_once_at_threshold() {
        let dir = tempfile::tempdir().unwrap();
        let logger = logger(dir.path());
        let options = LogOptions::new(Severity::Error, Category::Database)
            .with_stack("Error: DB down\n    at connect (db.ts:10)");

        let mut outcomes = Vec::new();
        for _ in 0..11 {
            outcomes.push(logger.log("DB down", options.clone()).await);
        }

        for outcome in &outcomes[..9] {
            assert!(!outcome.alerted);
        }
        assert!(outcomes[9].alerted);
        assert_eq!(outcomes[9].occurrences, 10);
        assert!(!outcomes[10].alerted);
        assert_eq!(outcomes[10].occurrences, 11);

        assert_eq!(alert_count(dir.path()), 1);
        assert_eq!(logger.stats(1).total, 11);
    }

    #[tokio::test]
    async fn test_fatal_alerts_immediately() {
        let dir = tempfile::tempdir().unwrap();
        let logger = logger(dir.path());

        let outcome = logger.log_fatal("Server crashed", Category::Server).await;
        assert!(outcome.alerted);
        assert_eq!(alert_count(dir.path()), 1);
    }

    #[tokio::test]
    async fn test_warnings_never_alert() {
        let dir = tempfile::tempdir().unwrap();
        let logger = logger(dir.path());

        for _ in 0..20 {
            assert!(!logger.log_warning("slow query", Category::Database).await.alerted);
        }
        assert_eq!(alert_count(dir.path()), 0);
    }

    #[tokio::test]
    async fn test_distinct_fingerprints_count_separately() {
        let dir = tempfile::tempdir().unwrap();
        let logger = logger(dir.path());

        for _ in 0..9 {
            logger.log_error("DB down", Category::Database).await;
        }
        let other = logger.log_error("DB down", Category::Network).await;
        assert_eq!(other.occurrences, 1);
        assert!(!other.alerted);
        assert_eq!(alert_count(dir.path()), 0);
    }

    #[tokio::test]
    async fn test_entry_persisted_when_log_returns() {
        let dir = tempfile::tempdir().unwrap();
        let logger = logger(dir.path());

        logger.log_info("Server started", Category::Server).await;

        let tail = logger.store().tail(1).unwrap();
        assert_eq!(tail.len(), 1);
        assert!(tail[0].ends_with("[INFO] [server] Server started"));
    }

    #[tokio::test]
    async fn test_unwritable_store_does_not_fail() {
        let dir = tempfile::tempdir().unwrap();
        // A regular file where the log directory should be.
        let blocker = dir.path().join("logs");
        std::fs::write(&blocker, "").unwrap();
        let logger = logger(&blocker);

        let outcome = logger.log_fatal("disk trouble", Category::Server).await;
        assert_eq!(outcome.occurrences, 1);
        assert!(outcome.alerted);
    }
}
