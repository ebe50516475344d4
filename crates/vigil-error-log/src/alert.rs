//! Threshold-based alerting.
//!
//! An alert is rendered once and fanned out to every enabled sink. Sink
//! failures are logged and never reach the caller.

use crate::entry::{iso_timestamp, LogEntry, Severity};
use crate::error::{ErrorLogError, ErrorLogResult};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

/// Environment variable holding the webhook URL.
pub const WEBHOOK_ENV: &str = "ERROR_WEBHOOK_URL";

const WEBHOOK_TIMEOUT: Duration = Duration::from_secs(10);
const CONSOLE_BORDER_WIDTH: usize = 60;

/// Occurrence counts at which a severity starts alerting.
pub fn default_thresholds() -> HashMap<Severity, u32> {
    HashMap::from([(Severity::Error, 10), (Severity::Fatal, 1)])
}

/// Which sinks receive alerts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertChannels {
    #[serde(default = "enabled")]
    pub console: bool,
    #[serde(default = "enabled")]
    pub file: bool,
    /// Webhook target. Alerts are posted only when this is set.
    #[serde(default)]
    pub webhook_url: Option<String>,
}

fn enabled() -> bool {
    true
}

impl Default for AlertChannels {
    fn default() -> Self {
        Self {
            console: true,
            file: true,
            webhook_url: None,
        }
    }
}

impl AlertChannels {
    /// Fill the webhook URL from `ERROR_WEBHOOK_URL` when it is not already set.
    pub fn with_env_webhook(mut self) -> Self {
        if self.webhook_url.is_none() {
            self.webhook_url = std::env::var(WEBHOOK_ENV)
                .ok()
                .filter(|url| !url.trim().is_empty());
        }
        self
    }
}

/// Decides whether an entry is alert-worthy and delivers the alert.
#[derive(Debug, Clone)]
pub struct AlertGate {
    thresholds: HashMap<Severity, u32>,
    channels: AlertChannels,
    alert_log: PathBuf,
    client: reqwest::Client,
}

impl AlertGate {
    pub fn new(
        thresholds: HashMap<Severity, u32>,
        channels: AlertChannels,
        alert_log: impl Into<PathBuf>,
    ) -> Self {
        let client = reqwest::Client::builder()
            .timeout(WEBHOOK_TIMEOUT)
            .build()
            .unwrap_or_else(|e| {
                warn!("Failed to build webhook client, using defaults: {}", e);
                reqwest::Client::new()
            });

        Self {
            thresholds,
            channels,
            alert_log: alert_log.into(),
            client,
        }
    }

    /// True when the severity has a threshold and `occurrences` reached it.
    pub fn should_alert(&self, severity: Severity, occurrences: u32) -> bool {
        self.thresholds
            .get(&severity)
            .is_some_and(|threshold| occurrences >= *threshold)
    }

    pub fn threshold(&self, severity: Severity) -> Option<u32> {
        self.thresholds.get(&severity).copied()
    }

    /// Render and deliver an alert to every enabled sink.
    pub async fn dispatch(&self, entry: &LogEntry) {
        let text = render_alert(entry);

        if self.channels.console {
            let border = "=".repeat(CONSOLE_BORDER_WIDTH);
            eprintln!("\n{}\n{}\n{}\n", border, text, border);
        }

        if self.channels.file {
            if let Err(e) = self.append_alert(&text).await {
                warn!("Failed to write alert file: {}", e);
            }
        }

        if let Some(url) = &self.channels.webhook_url {
            match self.post_webhook(url, entry, &text).await {
                Ok(()) => debug!("Alert delivered to webhook"),
                Err(e) => warn!("Failed to send webhook alert: {}", e),
            }
        }
    }

    async fn append_alert(&self, text: &str) -> ErrorLogResult<()> {
        if let Some(dir) = self.alert_log.parent() {
            if !dir.as_os_str().is_empty() {
                tokio::fs::create_dir_all(dir)
                    .await
                    .map_err(|e| ErrorLogError::io(dir, e))?;
            }
        }

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.alert_log)
            .await
            .map_err(|e| ErrorLogError::io(&self.alert_log, e))?;
        let block = format!("\n{}\n{}\n", text, "-".repeat(CONSOLE_BORDER_WIDTH));
        file.write_all(block.as_bytes())
            .await
            .map_err(|e| ErrorLogError::io(&self.alert_log, e))?;
        // tokio files write in the background; wait for the data to land.
        file.flush()
            .await
            .map_err(|e| ErrorLogError::io(&self.alert_log, e))
    }

    async fn post_webhook(&self, url: &str, entry: &LogEntry, text: &str) -> ErrorLogResult<()> {
        let body = json!({
            "text": text,
            "severity": entry.severity,
            "category": entry.category,
        });
        self.client
            .post(url)
            .json(&body)
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }
}

/// Alert body shared by all sinks.
pub fn render_alert(entry: &LogEntry) -> String {
    let context = serde_json::to_string_pretty(&entry.context).unwrap_or_else(|_| "{}".into());
    format!(
        "🚨 MetaBalance Error Alert\n\n\
         Severity: {}\n\
         Category: {}\n\
         Message: {}\n\
         Time: {}\n\n\
         Context: {}",
        entry.severity,
        entry.category,
        entry.message,
        iso_timestamp(&entry.timestamp),
        context
    )
}
