//! Size-based log rotation.
//!
//! A live file that grows past `max_size_bytes` is renamed to
//! `<name>.<timestamp>` and replaced by an empty file. Only the newest
//! `max_rotated_files` rotated siblings are kept.

use crate::entry::iso_timestamp;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

pub const DEFAULT_MAX_SIZE_BYTES: u64 = 10 * 1024 * 1024;
pub const DEFAULT_MAX_ROTATED_FILES: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RotationPolicy {
    pub max_size_bytes: u64,
    pub max_rotated_files: usize,
}

impl Default for RotationPolicy {
    fn default() -> Self {
        Self {
            max_size_bytes: DEFAULT_MAX_SIZE_BYTES,
            max_rotated_files: DEFAULT_MAX_ROTATED_FILES,
        }
    }
}

/// Rotate `path` if it is strictly larger than the policy allows.
///
/// Returns the rotated file's path when a rotation happened. A missing live
/// file is not an error.
pub fn rotate_if_needed(path: &Path, policy: &RotationPolicy) -> io::Result<Option<PathBuf>> {
    rotate_if_needed_at(path, policy, Utc::now())
}

pub(crate) fn rotate_if_needed_at(
    path: &Path,
    policy: &RotationPolicy,
    now: DateTime<Utc>,
) -> io::Result<Option<PathBuf>> {
    let size = match fs::metadata(path) {
        Ok(meta) => meta.len(),
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e),
    };

    if size <= policy.max_size_bytes {
        return Ok(None);
    }

    let rotated = rotated_name(path, now);
    fs::rename(path, &rotated)?;
    File::create(path)?;
    prune_rotated(path, policy.max_rotated_files)?;

    Ok(Some(rotated))
}

/// `<name>.<ISO timestamp with ':' and '.' replaced by '-'>`, with a numeric
/// suffix when a sibling with that name already exists.
fn rotated_name(path: &Path, now: DateTime<Utc>) -> PathBuf {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let stamp = iso_timestamp(&now).replace([':', '.'], "-");
    let base = path.with_file_name(format!("{}.{}", file_name, stamp));

    if !base.exists() {
        return base;
    }

    let mut n = 1;
    loop {
        let candidate = path.with_file_name(format!("{}.{}-{}", file_name, stamp, n));
        if !candidate.exists() {
            return candidate;
        }
        n += 1;
    }
}

/// Rotated siblings of `path`, newest first.
pub fn rotated_siblings(path: &Path) -> io::Result<Vec<PathBuf>> {
    let Some(file_name) = path.file_name().map(|n| n.to_string_lossy().into_owned()) else {
        return Ok(Vec::new());
    };
    let prefix = format!("{}.", file_name);
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };

    let mut siblings: Vec<PathBuf> = fs::read_dir(&dir)?
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_name().to_string_lossy().starts_with(&prefix))
        .map(|entry| entry.path())
        .collect();

    siblings.sort_by(|a, b| b.file_name().cmp(&a.file_name()));
    Ok(siblings)
}

fn prune_rotated(path: &Path, keep: usize) -> io::Result<()> {
    for stale in rotated_siblings(path)?.into_iter().skip(keep) {
        match fs::remove_file(&stale) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(e),
        }
    }
    Ok(())
}

/// Append-only file writer that rotates itself under a [`RotationPolicy`].
///
/// Used behind a `Mutex` as the tracing file sink for the supervisor's own
/// logs (`monitor.log`, `health-check.log`).
#[derive(Debug)]
pub struct RotatingFileWriter {
    path: PathBuf,
    policy: RotationPolicy,
    file: File,
    size: u64,
}

impl RotatingFileWriter {
    pub fn open(path: impl Into<PathBuf>, policy: RotationPolicy) -> io::Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        rotate_if_needed(&path, &policy)?;
        let file = open_append(&path)?;
        let size = file.metadata()?.len();
        Ok(Self {
            path,
            policy,
            file,
            size,
        })
    }

    fn rotate(&mut self) -> io::Result<()> {
        self.file.flush()?;
        rotate_if_needed(&self.path, &self.policy)?;
        self.file = open_append(&self.path)?;
        self.size = self.file.metadata()?.len();
        Ok(())
    }
}

impl Write for RotatingFileWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.size > self.policy.max_size_bytes {
            self.rotate()?;
        }
        let written = self.file.write(buf)?;
        self.size += written as u64;
        Ok(written)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file.flush()
    }
}

fn open_append(path: &Path) -> io::Result<File> {
    OpenOptions::new().create(true).append(true).open(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn policy(max_size_bytes: u64, max_rotated_files: usize) -> RotationPolicy {
        RotationPolicy {
            max_size_bytes,
            max_rotated_files,
        }
    }

    #[test]
    fn test_missing_file_is_noop() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("errors.log");
        assert_eq!(rotate_if_needed(&path, &policy(10, 5)).unwrap(), None);
        assert!(!path.exists());
    }

    #[test]
    fn test_rotates_only_above_limit() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("errors.log");

        fs::write(&path, vec![b'x'; 10]).unwrap();
        assert_eq!(rotate_if_needed(&path, &policy(10, 5)).unwrap(), None);

        fs::write(&path, vec![b'x'; 11]).unwrap();
        let now = Utc.with_ymd_and_hms(2026, 3, 1, 8, 30, 0).unwrap();
        let rotated = rotate_if_needed_at(&path, &policy(10, 5), now)
            .unwrap()
            .unwrap();

        assert_eq!(
            rotated.file_name().unwrap().to_string_lossy(),
            "errors.log.2026-03-01T08-30-00-000Z"
        );
        assert_eq!(fs::metadata(&rotated).unwrap().len(), 11);
        assert_eq!(fs::metadata(&path).unwrap().len(), 0);
    }

    #[test]
    fn test_same_instant_rotation_does_not_clobber() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("errors.log");
        let now = Utc.with_ymd_and_hms(2026, 3, 1, 8, 30, 0).unwrap();

        fs::write(&path, "first rotation").unwrap();
        let a = rotate_if_needed_at(&path, &policy(1, 5), now).unwrap().unwrap();
        fs::write(&path, "second rotation").unwrap();
        let b = rotate_if_needed_at(&path, &policy(1, 5), now).unwrap().unwrap();

        assert_ne!(a, b);
        assert_eq!(fs::read_to_string(a).unwrap(), "first rotation");
        assert_eq!(fs::read_to_string(b).unwrap(), "second rotation");
    }

    #[test]
    fn test_keeps_newest_rotated_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("errors.log");

        for minute in 0..7 {
            fs::write(&path, "payload").unwrap();
            let now = Utc.with_ymd_and_hms(2026, 3, 1, 8, minute, 0).unwrap();
            rotate_if_needed_at(&path, &policy(1, 5), now).unwrap();
        }

        let siblings = rotated_siblings(&path).unwrap();
        assert_eq!(siblings.len(), 5);
        let newest = siblings[0].file_name().unwrap().to_string_lossy().into_owned();
        let oldest = siblings[4].file_name().unwrap().to_string_lossy().into_owned();
        assert_eq!(newest, "errors.log.2026-03-01T08-06-00-000Z");
        assert_eq!(oldest, "errors.log.2026-03-01T08-02-00-000Z");
        assert!(path.exists());
    }

    #[test]
    fn test_siblings_ignore_other_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("errors.log");
        fs::write(dir.path().join("errors.json"), "{}").unwrap();
        fs::write(dir.path().join("alerts.log"), "x").unwrap();
        fs::write(dir.path().join("errors.log.2026-01-01T00-00-00-000Z"), "x").unwrap();

        let siblings = rotated_siblings(&path).unwrap();
        assert_eq!(siblings.len(), 1);
    }

    #[test]
    fn test_writer_rotates_when_full() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("monitor.log");
        let mut writer = RotatingFileWriter::open(&path, policy(16, 2)).unwrap();

        writer.write_all(b"0123456789abcdefXYZ\n").unwrap();
        writer.write_all(b"next line\n").unwrap();
        writer.flush().unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "next line\n");
        assert_eq!(rotated_siblings(&path).unwrap().len(), 1);
    }
}
