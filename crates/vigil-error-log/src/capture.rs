//! Managed service output capture.
//!
//! The supervised service's stdout and stderr both go to one append-mode log
//! file, so output survives after a detached supervisor exits.

use crate::entry::iso_timestamp;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::Stdio;

#[derive(Debug, Clone)]
pub struct ServiceOutput {
    path: PathBuf,
}

impl ServiceOutput {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Stdio handles for a child's stdout and stderr.
    pub fn stdio(&self) -> io::Result<(Stdio, Stdio)> {
        let stdout = self.open()?;
        let stderr = stdout.try_clone()?;
        Ok((Stdio::from(stdout), Stdio::from(stderr)))
    }

    /// Write a `--- note (timestamp) ---` separator line.
    pub fn mark(&self, note: &str) -> io::Result<()> {
        let mut file = self.open()?;
        writeln!(
            file,
            "--- {} ({}) ---",
            note,
            iso_timestamp(&chrono::Utc::now())
        )
    }

    fn open(&self) -> io::Result<File> {
        if let Some(dir) = self.path.parent() {
            if !dir.as_os_str().is_empty() {
                fs::create_dir_all(dir)?;
            }
        }
        OpenOptions::new().create(true).append(true).open(&self.path)
    }
}
