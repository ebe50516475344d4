//! # Vigil Process File
//!
//! PID marker persistence for the supervisor daemon.
//!
//! The marker is a plain-text file holding the daemon's own pid. It is used
//! to refuse a second daemon instance and to target `stop` signals. A marker
//! whose pid is no longer alive is stale and counts as "not running".

use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use vigil_common::{ProcessError, ProcessResult};
use vigil_process::process_exists;

/// Plain-text pid file.
#[derive(Debug, Clone)]
pub struct PidMarker {
    path: PathBuf,
}

impl PidMarker {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write `pid` to the marker, creating the parent directory if needed.
    pub async fn write(&self, pid: u32) -> ProcessResult<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                ProcessError::configuration(
                    self.id(),
                    format!("Failed to create marker directory: {}", e),
                )
            })?;
        }

        tokio::fs::write(&self.path, pid.to_string())
            .await
            .map_err(|e| {
                ProcessError::configuration(self.id(), format!("Failed to write PID marker: {}", e))
            })?;

        debug!("Wrote PID marker {} ({})", self.path.display(), pid);
        Ok(())
    }

    /// Write the current process id.
    pub async fn write_current(&self) -> ProcessResult<u32> {
        let pid = std::process::id();
        self.write(pid).await?;
        Ok(pid)
    }

    /// Read the recorded pid. A missing marker is `Ok(None)`; unparsable
    /// content is an error.
    pub async fn read(&self) -> ProcessResult<Option<u32>> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(ProcessError::configuration(
                    self.id(),
                    format!("Failed to read PID marker: {}", e),
                ))
            }
        };

        content.trim().parse::<u32>().map(Some).map_err(|e| {
            ProcessError::configuration(
                self.id(),
                format!("Invalid PID marker content {:?}: {}", content.trim(), e),
            )
        })
    }

    /// The recorded pid, if it belongs to a live process.
    pub async fn live_pid(&self) -> Option<u32> {
        match self.read().await {
            Ok(Some(pid)) if process_exists(pid) => Some(pid),
            Ok(Some(pid)) => {
                debug!("PID marker {} is stale (pid {} not alive)", self.path.display(), pid);
                None
            }
            Ok(None) => None,
            Err(e) => {
                warn!("Ignoring unreadable PID marker: {}", e);
                None
            }
        }
    }

    /// Delete the marker. Deleting a missing marker is not an error.
    pub async fn remove(&self) -> ProcessResult<()> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(ProcessError::configuration(
                self.id(),
                format!("Failed to delete PID marker: {}", e),
            )),
        }
    }

    fn id(&self) -> String {
        self.path.display().to_string()
    }
}
