//! Store directory management.
//!
//! This module handles the file system layout for the log engine:
//!
//! ```text
//! <root>/
//! ├─ LOCK            # Advisory lock for single-process access
//! ├─ data/           # Data-kind segments: seg-000001.dat, ...
//! └─ configuration/  # Configuration-kind segments
//! ```
//!
//! The LOCK file ensures only one process can own the store at a time.
//! There is no manifest: the segment files themselves fully describe
//! durable state at recovery time.

use crate::error::{StoreError, StoreResult};
use crate::types::EntryKind;
use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};

/// Name of the advisory lock file within the store root.
const LOCK_FILE: &str = "LOCK";

/// Manages the store directory structure and file locking.
///
/// # Thread Safety
///
/// The `StoreDir` holds an exclusive advisory lock on the store root.
/// Only one `StoreDir` instance can exist per root at a time, across
/// processes. The lock is released when the `StoreDir` is dropped.
#[derive(Debug)]
pub struct StoreDir {
    /// Root directory path.
    path: PathBuf,
    /// Lock file handle (held for exclusive access).
    _lock_file: File,
}

impl StoreDir {
    /// Opens or creates a store directory.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The directory doesn't exist and `create_if_missing` is false
    /// - Another process holds the lock (returns `StoreLocked`)
    /// - I/O errors occur
    pub fn open(path: &Path, create_if_missing: bool) -> StoreResult<Self> {
        if !path.exists() {
            if create_if_missing {
                fs::create_dir_all(path)?;
            } else {
                return Err(StoreError::invalid_operation(format!(
                    "store directory does not exist: {}",
                    path.display()
                )));
            }
        }

        if !path.is_dir() {
            return Err(StoreError::invalid_operation(format!(
                "path is not a directory: {}",
                path.display()
            )));
        }

        // Acquire exclusive lock (non-blocking)
        let lock_path = path.join(LOCK_FILE);
        let lock_file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&lock_path)?;

        if lock_file.try_lock_exclusive().is_err() {
            return Err(StoreError::StoreLocked);
        }

        // One subdirectory per entry kind
        for kind in EntryKind::ALL {
            fs::create_dir_all(path.join(kind.dir_name()))?;
        }

        Ok(Self {
            path: path.to_path_buf(),
            _lock_file: lock_file,
        })
    }

    /// Returns the path to the store root directory.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the segment directory for the given entry kind.
    #[must_use]
    pub fn kind_dir(&self, kind: EntryKind) -> PathBuf {
        self.path.join(kind.dir_name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn open_creates_layout() {
        let dir = tempdir().unwrap();
        let root = dir.path().join("store");

        let store_dir = StoreDir::open(&root, true).unwrap();

        assert!(root.join("LOCK").exists());
        assert!(store_dir.kind_dir(EntryKind::Data).is_dir());
        assert!(store_dir.kind_dir(EntryKind::Configuration).is_dir());
    }

    #[test]
    fn open_missing_without_create_fails() {
        let dir = tempdir().unwrap();
        let root = dir.path().join("missing");

        let result = StoreDir::open(&root, false);
        assert!(matches!(result, Err(StoreError::InvalidOperation { .. })));
    }

    #[test]
    fn second_open_is_locked() {
        let dir = tempdir().unwrap();
        let root = dir.path().join("store");

        let _first = StoreDir::open(&root, true).unwrap();
        let second = StoreDir::open(&root, true);
        assert!(matches!(second, Err(StoreError::StoreLocked)));
    }

    #[test]
    fn lock_released_on_drop() {
        let dir = tempdir().unwrap();
        let root = dir.path().join("store");

        {
            let _first = StoreDir::open(&root, true).unwrap();
        }

        let second = StoreDir::open(&root, true);
        assert!(second.is_ok());
    }
}
