//! Replicated-log storage facade.
//!
//! [`LogStorage`] owns the store directory lock and one
//! [`TypedLogStore`] per entry kind, routing every operation by kind.
//! The two logs never share segments, indices, or index sequences.

use crate::config::Config;
use crate::dir::StoreDir;
use crate::error::{StoreError, StoreResult};
use crate::store::{RecoverySummary, TypedLogStore};
use crate::types::{EntryKind, LogEntry};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::info;

/// Durable storage for replicated log entries, one log per kind.
///
/// Opening acquires an exclusive lock on the store root and runs
/// recovery, so a freshly opened storage is always ready for appends.
/// Operations on different kinds proceed independently.
pub struct LogStorage {
    dir: StoreDir,
    configuration: TypedLogStore,
    data: TypedLogStore,
    closed: AtomicBool,
}

impl LogStorage {
    /// Opens the storage rooted at `root`, creating it if configured,
    /// and recovers both logs.
    ///
    /// # Errors
    ///
    /// Returns `StoreLocked` if another process owns the root, and
    /// `Corruption` if recovery finds damage it cannot repair.
    pub fn open(root: &Path, config: Config) -> StoreResult<Self> {
        let dir = StoreDir::open(root, config.create_if_missing)?;

        let configuration = TypedLogStore::open(
            EntryKind::Configuration,
            &dir.kind_dir(EntryKind::Configuration),
            config.segment_size_for(EntryKind::Configuration),
            config.sync_on_append,
        )?;
        let data = TypedLogStore::open(
            EntryKind::Data,
            &dir.kind_dir(EntryKind::Data),
            config.segment_size_for(EntryKind::Data),
            config.sync_on_append,
        )?;

        let storage = Self {
            dir,
            configuration,
            data,
            closed: AtomicBool::new(false),
        };
        storage.recover()?;

        info!(root = %storage.dir.path().display(), "log storage open");
        Ok(storage)
    }

    /// Re-runs recovery for both logs.
    ///
    /// The configuration log is always recovered before the data log,
    /// since consensus needs its membership history before it can
    /// interpret data entries. Recovery is idempotent.
    pub fn recover(&self) -> StoreResult<Vec<RecoverySummary>> {
        self.check_open()?;
        let mut summaries = Vec::with_capacity(EntryKind::ALL.len());
        for kind in EntryKind::ALL {
            summaries.push(self.store(kind).recover()?);
        }
        Ok(summaries)
    }

    /// Returns the store root path.
    #[must_use]
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Appends an entry to the log of its kind, assigning the next
    /// sequential index in that log. Returns the assigned index.
    pub fn append(&self, kind: EntryKind, term: u64, payload: Vec<u8>) -> StoreResult<u64> {
        self.check_open()?;
        self.store(kind).append(term, payload)
    }

    /// Appends an entry at an explicit index in the log of its kind.
    ///
    /// # Errors
    ///
    /// Returns `OutOfOrderAppend` if `index` is not the next expected
    /// index for that log.
    pub fn append_at(
        &self,
        kind: EntryKind,
        index: u64,
        term: u64,
        payload: Vec<u8>,
    ) -> StoreResult<u64> {
        self.check_open()?;
        self.store(kind).append_at(index, term, payload)
    }

    /// Forces the named log's appended entries to stable storage.
    pub fn flush(&self, kind: EntryKind) -> StoreResult<()> {
        self.check_open()?;
        self.store(kind).flush()
    }

    /// Reads the entry at `index` from the log of the given kind.
    pub fn get(&self, kind: EntryKind, index: u64) -> StoreResult<LogEntry> {
        self.check_open()?;
        self.store(kind).get(index)
    }

    /// Returns the term of the entry at `index` in the given log.
    pub fn term_of(&self, kind: EntryKind, index: u64) -> StoreResult<u64> {
        self.check_open()?;
        self.store(kind).term_of(index)
    }

    /// Compacts the given log below `cutoff_exclusive`.
    pub fn truncate_prefix(&self, kind: EntryKind, cutoff_exclusive: u64) -> StoreResult<()> {
        self.check_open()?;
        self.store(kind).truncate_prefix(cutoff_exclusive)
    }

    /// Rewinds the given log, discarding entries at and after
    /// `cutoff_inclusive`.
    pub fn truncate_suffix(&self, kind: EntryKind, cutoff_inclusive: u64) -> StoreResult<()> {
        self.check_open()?;
        self.store(kind).truncate_suffix(cutoff_inclusive)
    }

    /// Returns the earliest retained index of the given log.
    pub fn first_index(&self, kind: EntryKind) -> StoreResult<u64> {
        self.check_open()?;
        self.store(kind).first_index()
    }

    /// Returns the last index of the given log, or 0 if it is empty.
    pub fn last_index(&self, kind: EntryKind) -> StoreResult<u64> {
        self.check_open()?;
        self.store(kind).last_index()
    }

    /// Returns `(first_index, last_index)` of the given log as one
    /// consistent snapshot.
    pub fn index_bounds(&self, kind: EntryKind) -> StoreResult<(u64, u64)> {
        self.check_open()?;
        self.store(kind).index_bounds()
    }

    /// Flushes both logs and closes the storage.
    ///
    /// Closing is idempotent. Every operation after close returns
    /// `StoreClosed`; the directory lock is released when the storage
    /// is dropped.
    pub fn close(&self) -> StoreResult<()> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        for kind in EntryKind::ALL {
            self.store(kind).flush()?;
        }
        info!(root = %self.dir.path().display(), "log storage closed");
        Ok(())
    }

    fn store(&self, kind: EntryKind) -> &TypedLogStore {
        match kind {
            EntryKind::Configuration => &self.configuration,
            EntryKind::Data => &self.data,
        }
    }

    fn check_open(&self) -> StoreResult<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(StoreError::StoreClosed);
        }
        Ok(())
    }
}

impl std::fmt::Debug for LogStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LogStorage")
            .field("path", &self.dir.path())
            .field("closed", &self.closed.load(Ordering::SeqCst))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn small_config() -> Config {
        Config::new()
            .data_segment_size(1024)
            .configuration_segment_size(1024)
    }

    #[test]
    fn open_creates_and_recovers() {
        let dir = tempdir().unwrap();
        let root = dir.path().join("store");

        let storage = LogStorage::open(&root, small_config()).unwrap();
        assert_eq!(storage.last_index(EntryKind::Data).unwrap(), 0);
        assert_eq!(storage.last_index(EntryKind::Configuration).unwrap(), 0);
    }

    #[test]
    fn kinds_have_independent_index_sequences() {
        let dir = tempdir().unwrap();
        let storage = LogStorage::open(dir.path(), small_config()).unwrap();

        assert_eq!(storage.append(EntryKind::Data, 1, b"d1".to_vec()).unwrap(), 1);
        assert_eq!(storage.append(EntryKind::Data, 1, b"d2".to_vec()).unwrap(), 2);
        assert_eq!(
            storage.append(EntryKind::Configuration, 1, b"c1".to_vec()).unwrap(),
            1
        );

        assert_eq!(storage.last_index(EntryKind::Data).unwrap(), 2);
        assert_eq!(storage.last_index(EntryKind::Configuration).unwrap(), 1);

        assert_eq!(storage.get(EntryKind::Data, 1).unwrap().payload, b"d1".to_vec());
        assert_eq!(
            storage.get(EntryKind::Configuration, 1).unwrap().payload,
            b"c1".to_vec()
        );
    }

    #[test]
    fn truncation_routes_by_kind() {
        let dir = tempdir().unwrap();
        let storage = LogStorage::open(dir.path(), small_config()).unwrap();

        for i in 1..=5u64 {
            storage.append(EntryKind::Data, 1, vec![i as u8]).unwrap();
            storage.append(EntryKind::Configuration, 1, vec![i as u8]).unwrap();
        }

        storage.truncate_suffix(EntryKind::Data, 3).unwrap();

        assert_eq!(storage.last_index(EntryKind::Data).unwrap(), 2);
        assert_eq!(storage.last_index(EntryKind::Configuration).unwrap(), 5);
        assert_eq!(storage.index_bounds(EntryKind::Data).unwrap(), (1, 2));
        assert_eq!(storage.index_bounds(EntryKind::Configuration).unwrap(), (1, 5));
    }

    #[test]
    fn reopen_restores_both_logs() {
        let dir = tempdir().unwrap();
        {
            let storage = LogStorage::open(dir.path(), small_config()).unwrap();
            storage.append(EntryKind::Data, 2, b"data".to_vec()).unwrap();
            storage.append(EntryKind::Configuration, 2, b"conf".to_vec()).unwrap();
            storage.close().unwrap();
        }

        let storage = LogStorage::open(dir.path(), small_config()).unwrap();
        assert_eq!(storage.get(EntryKind::Data, 1).unwrap().payload, b"data".to_vec());
        assert_eq!(
            storage.get(EntryKind::Configuration, 1).unwrap().payload,
            b"conf".to_vec()
        );
    }

    #[test]
    fn recover_reports_configuration_first() {
        let dir = tempdir().unwrap();
        let storage = LogStorage::open(dir.path(), small_config()).unwrap();

        let summaries = storage.recover().unwrap();
        assert_eq!(summaries.len(), 2);
        assert_eq!(summaries[0].kind, EntryKind::Configuration);
        assert_eq!(summaries[1].kind, EntryKind::Data);
    }

    #[test]
    fn closed_storage_rejects_operations() {
        let dir = tempdir().unwrap();
        let storage = LogStorage::open(dir.path(), small_config()).unwrap();

        storage.close().unwrap();
        storage.close().unwrap(); // Idempotent

        assert!(matches!(
            storage.append(EntryKind::Data, 1, vec![1]),
            Err(StoreError::StoreClosed)
        ));
        assert!(matches!(
            storage.get(EntryKind::Data, 1),
            Err(StoreError::StoreClosed)
        ));
        assert!(matches!(storage.recover(), Err(StoreError::StoreClosed)));
    }

    #[test]
    fn second_open_of_same_root_is_locked() {
        let dir = tempdir().unwrap();

        let _first = LogStorage::open(dir.path(), small_config()).unwrap();
        let second = LogStorage::open(dir.path(), small_config());
        assert!(matches!(second, Err(StoreError::StoreLocked)));
    }

    #[test]
    fn open_missing_without_create_fails() {
        let dir = tempdir().unwrap();
        let root = dir.path().join("missing");

        let config = small_config().create_if_missing(false);
        let result = LogStorage::open(&root, config);
        assert!(matches!(result, Err(StoreError::InvalidOperation { .. })));
    }
}
