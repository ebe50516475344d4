//! Log entry model.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Severity of a log entry, lowest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    Debug,
    Info,
    Warn,
    Error,
    Fatal,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Debug => "DEBUG",
            Self::Info => "INFO",
            Self::Warn => "WARN",
            Self::Error => "ERROR",
            Self::Fatal => "FATAL",
        }
    }

    /// ERROR and FATAL entries are echoed to the console.
    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error | Self::Fatal)
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Subsystem an entry belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Server,
    Database,
    Api,
    Client,
    Network,
    Auth,
    Validation,
    Unknown,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Server => "server",
            Self::Database => "database",
            Self::Api => "api",
            Self::Client => "client",
            Self::Network => "network",
            Self::Auth => "auth",
            Self::Validation => "validation",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Caller-supplied attributes of a log call.
#[derive(Debug, Clone)]
pub struct LogOptions {
    pub severity: Severity,
    pub category: Category,
    pub context: Map<String, Value>,
    pub stack: Option<String>,
}

impl Default for LogOptions {
    fn default() -> Self {
        Self {
            severity: Severity::Error,
            category: Category::Unknown,
            context: Map::new(),
            stack: None,
        }
    }
}

impl LogOptions {
    pub fn new(severity: Severity, category: Category) -> Self {
        Self {
            severity,
            category,
            ..Self::default()
        }
    }

    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }

    pub fn with_stack(mut self, stack: impl Into<String>) -> Self {
        self.stack = Some(stack.into());
        self
    }
}

/// One immutable log record. The JSON field names match the `errors.json`
/// format consumed by existing tooling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    pub severity: Severity,
    pub category: Category,
    pub message: String,
    #[serde(default)]
    pub context: Map<String, Value>,
    #[serde(default)]
    pub stack: Option<String>,
    pub pid: u32,
    pub hostname: String,
}

impl LogEntry {
    /// Build an entry stamped with the current time and process id.
    pub fn new(message: impl Into<String>, options: LogOptions, hostname: impl Into<String>) -> Self {
        Self::at(Utc::now(), message, options, hostname)
    }

    /// Build an entry with an explicit timestamp.
    pub fn at(
        timestamp: DateTime<Utc>,
        message: impl Into<String>,
        options: LogOptions,
        hostname: impl Into<String>,
    ) -> Self {
        Self {
            timestamp,
            severity: options.severity,
            category: options.category,
            message: message.into(),
            context: options.context,
            stack: options.stack,
            pid: std::process::id(),
            hostname: hostname.into(),
        }
    }

    /// Deduplication key: `category:message:first stack line`.
    pub fn fingerprint(&self) -> String {
        let first_stack_line = self
            .stack
            .as_deref()
            .and_then(|s| s.lines().next())
            .unwrap_or("");
        format!("{}:{}:{}", self.category, self.message, first_stack_line)
    }

    /// `[timestamp] [SEVERITY] [category] message`
    pub fn human_line(&self) -> String {
        format!(
            "[{}] [{}] [{}] {}",
            iso_timestamp(&self.timestamp),
            self.severity,
            self.category,
            self.message
        )
    }
}

/// ISO-8601 with millisecond precision and a `Z` suffix.
pub fn iso_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Hostname used to tag entries: `$HOSTNAME`, or `unknown`.
pub fn hostname_from_env() -> String {
    std::env::var("HOSTNAME")
        .ok()
        .filter(|h| !h.trim().is_empty())
        .unwrap_or_else(|| "unknown".to_string())
}
