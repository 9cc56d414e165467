//! Snapshot files in the archive directory.
//!
//! Each device has one file, `<root>/<name>.cnf`. Writes go to a temporary
//! file in the same directory that is then renamed over the target, so a
//! crash mid-write never leaves a truncated snapshot behind.

use std::io::{self, Write};
use std::path::{Path, PathBuf};

use log::debug;
use tempfile::NamedTempFile;

use crate::error::{ArchiveError, Result};

/// File extension of persisted snapshots.
pub const SNAPSHOT_EXTENSION: &str = "cnf";

/// Captured running configuration of one device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    pub device: String,
    pub text: String,
}

impl Snapshot {
    pub fn new(device: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            device: device.into(),
            text: text.into(),
        }
    }
}

/// Directory of snapshot files.
#[derive(Debug, Clone)]
pub struct SnapshotArchive {
    root: PathBuf,
}

impl SnapshotArchive {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of the snapshot file for `device`.
    pub fn path_for(&self, device: &str) -> PathBuf {
        self.root.join(format!("{device}.{SNAPSHOT_EXTENSION}"))
    }

    /// Read the last persisted snapshot, `None` if the device has none yet.
    pub fn load_previous(&self, device: &str) -> Result<Option<String>> {
        let path = self.path_for(device);
        match std::fs::read_to_string(&path) {
            Ok(text) => Ok(Some(text)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(ArchiveError::Read { path, source }.into()),
        }
    }

    /// Atomically replace the snapshot file. Returns its path.
    pub fn persist(&self, snapshot: &Snapshot) -> Result<PathBuf> {
        let path = self.path_for(&snapshot.device);
        let write_err = |source| ArchiveError::Write {
            path: path.clone(),
            source,
        };

        let mut file = NamedTempFile::new_in(&self.root).map_err(write_err)?;
        file.write_all(snapshot.text.as_bytes()).map_err(write_err)?;
        file.as_file().sync_all().map_err(write_err)?;
        file.persist(&path).map_err(|e| write_err(e.error))?;

        debug!("{}: wrote {}", snapshot.device, path.display());
        Ok(path)
    }

    /// Delete the snapshot of `device`. A missing file is not an error.
    pub fn remove(&self, device: &str) -> Result<()> {
        let path = self.path_for(device);
        match std::fs::remove_file(&path) {
            Ok(()) => {
                debug!("{}: removed {}", device, path.display());
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(ArchiveError::Remove { path, source }.into()),
        }
    }
}
