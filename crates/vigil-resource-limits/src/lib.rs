//! # Vigil Resource Limits
//!
//! Host resource headroom checks for the vigil supervisor.
//!
//! Development servers with hot reload hold many inotify instances; when the
//! host runs out, the service misbehaves without crashing. This crate reads
//! the kernel's watch limit and counts inotify instances held by all
//! processes, mirroring what `lsof | grep inotify` reports.

use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Default limit on inotify instances before headroom is considered exhausted.
pub const DEFAULT_FILE_WATCH_THRESHOLD: u64 = 500;

const INOTIFY_LINK: &str = "anon_inode:inotify";

/// Inotify usage snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileWatchUsage {
    pub used: u64,
    pub max: u64,
}

impl FileWatchUsage {
    pub fn exceeds(&self, threshold: u64) -> bool {
        self.used > threshold
    }
}

/// Reads inotify usage from a procfs mount.
#[derive(Debug, Clone)]
pub struct FileWatchProbe {
    proc_root: PathBuf,
}

impl Default for FileWatchProbe {
    fn default() -> Self {
        Self::new("/proc")
    }
}

impl FileWatchProbe {
    pub fn new(proc_root: impl Into<PathBuf>) -> Self {
        Self {
            proc_root: proc_root.into(),
        }
    }

    /// Current usage, or an error when the limit cannot be read.
    pub fn usage(&self) -> io::Result<FileWatchUsage> {
        let max = read_max_user_watches(&self.proc_root)?;
        let used = count_inotify_instances(&self.proc_root)?;
        Ok(FileWatchUsage { used, max })
    }

    /// True when usage is at or below `threshold`. Failing to measure counts
    /// as healthy so that a missing procfs never blocks recovery.
    pub fn has_headroom(&self, threshold: u64) -> bool {
        match self.usage() {
            Ok(usage) => {
                info!("File watchers: {} / {}", usage.used, usage.max);
                if usage.exceeds(threshold) {
                    warn!(
                        "High file watcher usage: {} (threshold {})",
                        usage.used, threshold
                    );
                    false
                } else {
                    true
                }
            }
            Err(e) => {
                debug!("Could not measure file watcher usage: {}", e);
                true
            }
        }
    }
}

fn read_max_user_watches(proc_root: &Path) -> io::Result<u64> {
    let path = proc_root.join("sys/fs/inotify/max_user_watches");
    let raw = fs::read_to_string(&path)?;
    raw.trim()
        .parse()
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, format!("{}: {}", path.display(), e)))
}

/// Count file descriptors across all visible processes that refer to an
/// inotify instance. Processes we may not inspect are skipped.
fn count_inotify_instances(proc_root: &Path) -> io::Result<u64> {
    let mut count = 0;

    for entry in fs::read_dir(proc_root)?.filter_map(Result::ok) {
        let is_pid = entry
            .file_name()
            .to_str()
            .is_some_and(|name| !name.is_empty() && name.bytes().all(|b| b.is_ascii_digit()));
        if !is_pid {
            continue;
        }

        let Ok(fds) = fs::read_dir(entry.path().join("fd")) else {
            continue;
        };
        count += fds
            .filter_map(Result::ok)
            .filter_map(|fd| fs::read_link(fd.path()).ok())
            .filter(|target| target.as_os_str() == INOTIFY_LINK)
            .count() as u64;
    }

    Ok(count)
}
