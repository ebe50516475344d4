//! Append-only error store.
//!
//! Every entry is written twice: a human-readable line to `errors.log` and a
//! JSON line to `errors.json`. Both files rotate under the same policy.

use crate::entry::{Category, LogEntry, Severity};
use crate::error::{ErrorLogError, ErrorLogResult};
use crate::rotation::{rotate_if_needed, RotationPolicy};
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs::{self, OpenOptions};
use std::io::{self, BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{debug, warn};

/// Number of entries reported in [`ErrorStats::recent`].
pub const RECENT_LIMIT: usize = 10;

/// Files owned by the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogPaths {
    pub text_log: PathBuf,
    pub json_log: PathBuf,
    pub alert_log: PathBuf,
}

impl LogPaths {
    /// Standard layout inside a log directory.
    pub fn in_dir(dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        Self {
            text_log: dir.join("errors.log"),
            json_log: dir.join("errors.json"),
            alert_log: dir.join("alerts.log"),
        }
    }
}

/// Aggregate over a recent time window.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ErrorStats {
    pub total: usize,
    pub by_severity: BTreeMap<Severity, usize>,
    pub by_category: BTreeMap<Category, usize>,
    /// Up to the last ten entries in the window, oldest first.
    pub recent: Vec<LogEntry>,
}

#[derive(Debug)]
pub struct LogStore {
    paths: LogPaths,
    policy: RotationPolicy,
    write_lock: Mutex<()>,
}

impl LogStore {
    pub fn new(paths: LogPaths, policy: RotationPolicy) -> Self {
        Self {
            paths,
            policy,
            write_lock: Mutex::new(()),
        }
    }

    pub fn paths(&self) -> &LogPaths {
        &self.paths
    }

    /// Append one entry to both files, rotating each first if it is full.
    ///
    /// Rotation failures are logged and do not prevent the append.
    pub fn append(&self, entry: &LogEntry) -> ErrorLogResult<()> {
        let json = serde_json::to_string(entry)?;
        let text = entry.human_line();

        let _guard = self
            .write_lock
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        self.ensure_dir()?;
        self.rotate(&self.paths.text_log);
        self.rotate(&self.paths.json_log);

        append_line(&self.paths.text_log, &text)?;
        append_line(&self.paths.json_log, &json)?;
        Ok(())
    }

    /// Aggregate entries newer than `hours_back` hours.
    pub fn query_stats(&self, hours_back: u32) -> ErrorStats {
        self.query_stats_at(hours_back, Utc::now())
    }

    /// A window reaching past the earliest representable time covers every entry.
    pub fn query_stats_at(&self, hours_back: u32, now: DateTime<Utc>) -> ErrorStats {
        let cutoff = now
            .checked_sub_signed(Duration::hours(i64::from(hours_back)))
            .unwrap_or(DateTime::<Utc>::MIN_UTC);
        let mut stats = ErrorStats::default();

        for entry in self.read_entries() {
            if entry.timestamp <= cutoff {
                continue;
            }
            stats.total += 1;
            *stats.by_severity.entry(entry.severity).or_insert(0) += 1;
            *stats.by_category.entry(entry.category).or_insert(0) += 1;
            stats.recent.push(entry);
        }

        let overflow = stats.recent.len().saturating_sub(RECENT_LIMIT);
        stats.recent.drain(..overflow);
        stats
    }

    /// The last `lines` lines of the human-readable log.
    pub fn tail(&self, lines: usize) -> ErrorLogResult<Vec<String>> {
        let file = match fs::File::open(&self.paths.text_log) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(ErrorLogError::io(&self.paths.text_log, e)),
        };

        let all: Vec<String> = BufReader::new(file)
            .lines()
            .collect::<io::Result<_>>()
            .map_err(|e| ErrorLogError::io(&self.paths.text_log, e))?;
        let skip = all.len().saturating_sub(lines);
        Ok(all.into_iter().skip(skip).collect())
    }

    /// Truncate the text, JSON and alert logs.
    pub fn clear(&self) -> ErrorLogResult<()> {
        let _guard = self
            .write_lock
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        self.ensure_dir()?;
        for path in [
            &self.paths.text_log,
            &self.paths.json_log,
            &self.paths.alert_log,
        ] {
            fs::write(path, "").map_err(|e| ErrorLogError::io(path, e))?;
        }
        Ok(())
    }

    /// Parsed JSON entries; unreadable lines are skipped.
    fn read_entries(&self) -> Vec<LogEntry> {
        let file = match fs::File::open(&self.paths.json_log) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Vec::new(),
            Err(e) => {
                warn!("Failed to open {}: {}", self.paths.json_log.display(), e);
                return Vec::new();
            }
        };

        let mut skipped = 0usize;
        let entries: Vec<LogEntry> = BufReader::new(file)
            .lines()
            .map_while(Result::ok)
            .filter(|line| !line.trim().is_empty())
            .filter_map(|line| match serde_json::from_str(&line) {
                Ok(entry) => Some(entry),
                Err(_) => {
                    skipped += 1;
                    None
                }
            })
            .collect();

        if skipped > 0 {
            debug!(
                "Skipped {} malformed line(s) in {}",
                skipped,
                self.paths.json_log.display()
            );
        }
        entries
    }

    fn rotate(&self, path: &Path) {
        match rotate_if_needed(path, &self.policy) {
            Ok(Some(rotated)) => debug!("Rotated {} to {}", path.display(), rotated.display()),
            Ok(None) => {}
            Err(e) => warn!("Failed to rotate {}: {}", path.display(), e),
        }
    }

    fn ensure_dir(&self) -> ErrorLogResult<()> {
        match self.paths.text_log.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => {
                fs::create_dir_all(dir).map_err(|e| ErrorLogError::io(dir, e))
            }
            _ => Ok(()),
        }
    }
}

fn append_line(path: &Path, line: &str) -> ErrorLogResult<()> {
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| ErrorLogError::io(path, e))?;
    writeln!(file, "{}", line).map_err(|e| ErrorLogError::io(path, e))
}
