//! Segment files and segment allocation.
//!
//! A segment is a bounded-size, append-only file holding a contiguous
//! run of encoded records for one entry kind. Exactly one segment per
//! kind is active (accepting appends) at a time; earlier segments are
//! sealed and never mutated in place, which is what makes concurrent
//! reads against them safe without locking.

use crate::error::{StoreError, StoreResult};
use crate::types::SegmentId;
use quill_storage::{FileBackend, StorageBackend};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Segment file names look like `seg-000001.dat`.
const SEGMENT_PREFIX: &str = "seg-";
const SEGMENT_SUFFIX: &str = ".dat";

/// Returns the file name for a segment id.
fn segment_file_name(id: SegmentId) -> String {
    format!("{SEGMENT_PREFIX}{:06}{SEGMENT_SUFFIX}", id.as_u32())
}

/// Parses a segment id out of a file name, if it is a segment file.
fn parse_segment_id(name: &str) -> Option<SegmentId> {
    let digits = name
        .strip_prefix(SEGMENT_PREFIX)?
        .strip_suffix(SEGMENT_SUFFIX)?;
    digits.parse::<u32>().ok().map(SegmentId::new)
}

/// A single bounded-size segment file.
pub struct Segment {
    id: SegmentId,
    path: PathBuf,
    backend: Box<dyn StorageBackend>,
    capacity: u64,
    sealed: bool,
}

impl Segment {
    /// Opens an existing segment file.
    fn open(path: PathBuf, id: SegmentId, capacity: u64, sealed: bool) -> StoreResult<Self> {
        let backend = FileBackend::open(&path)?;
        Ok(Self {
            id,
            path,
            backend: Box::new(backend),
            capacity,
            sealed,
        })
    }

    /// Builds a segment over an arbitrary backend, for format-level and
    /// torn-write tests that do not need a real file.
    #[cfg(test)]
    pub(crate) fn with_backend(
        id: SegmentId,
        backend: Box<dyn StorageBackend>,
        capacity: u64,
    ) -> Self {
        Self {
            id,
            path: PathBuf::new(),
            backend,
            capacity,
            sealed: false,
        }
    }

    /// Returns the segment id.
    #[must_use]
    pub fn id(&self) -> SegmentId {
        self.id
    }

    /// Returns whether the segment is sealed (read-only).
    #[must_use]
    pub fn is_sealed(&self) -> bool {
        self.sealed
    }

    /// Returns the current size of the segment in bytes.
    pub fn size(&self) -> StoreResult<u64> {
        Ok(self.backend.size()?)
    }

    /// Returns whether a record of `record_len` bytes fits in the
    /// remaining capacity.
    pub fn has_room(&self, record_len: u64) -> StoreResult<bool> {
        let size = self.size()?;
        Ok(size.saturating_add(record_len) <= self.capacity)
    }

    /// Appends raw record bytes, returning the write offset.
    ///
    /// # Errors
    ///
    /// Returns `InvalidOperation` if the segment is sealed.
    pub fn append(&mut self, data: &[u8]) -> StoreResult<u64> {
        if self.sealed {
            return Err(StoreError::invalid_operation(format!(
                "append to sealed segment {}",
                self.id
            )));
        }
        Ok(self.backend.append(data)?)
    }

    /// Reads `len` bytes at `offset`.
    pub fn read_at(&self, offset: u64, len: usize) -> StoreResult<Vec<u8>> {
        Ok(self.backend.read_at(offset, len)?)
    }

    /// Syncs segment data to stable storage.
    pub fn sync(&mut self) -> StoreResult<()> {
        Ok(self.backend.sync()?)
    }

    /// Seals the segment: syncs it and marks it read-only.
    pub fn seal(&mut self) -> StoreResult<()> {
        self.backend.sync()?;
        self.sealed = true;
        debug!(segment = %self.id, "sealed segment");
        Ok(())
    }

    /// Re-opens a sealed segment for appends.
    ///
    /// Used by suffix truncation when the cut lands inside a sealed
    /// segment, which then becomes the active segment again.
    pub fn unseal(&mut self) {
        self.sealed = false;
    }

    /// Truncates the segment to `new_size` bytes and syncs.
    pub fn truncate(&mut self, new_size: u64) -> StoreResult<()> {
        self.backend.truncate(new_size)?;
        Ok(())
    }

    /// Deletes the segment file from disk, consuming the handle.
    pub fn delete(self) -> StoreResult<()> {
        debug!(segment = %self.id, path = %self.path.display(), "deleting segment");
        fs::remove_file(&self.path)?;
        Ok(())
    }
}

impl std::fmt::Debug for Segment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Segment")
            .field("id", &self.id)
            .field("path", &self.path)
            .field("capacity", &self.capacity)
            .field("sealed", &self.sealed)
            .finish()
    }
}

/// Creates and rolls segments for one entry kind.
///
/// Allocation is single-writer per kind: the owning store serializes all
/// calls. A new segment is always numbered as the successor of the
/// highest live id, so the live set of ids stays gap-free.
#[derive(Debug)]
pub struct SegmentAllocator {
    dir: PathBuf,
    capacity: u64,
}

impl SegmentAllocator {
    /// Opens the allocator over a kind directory, returning the existing
    /// segments in ascending id order.
    ///
    /// All segments but the highest-id one are opened sealed. If the
    /// directory holds no segments, the first segment is created.
    ///
    /// # Errors
    ///
    /// Returns `Corruption` if the segment ids on disk are not
    /// consecutive.
    pub fn open(dir: &Path, capacity: u64) -> StoreResult<(Self, Vec<Segment>)> {
        let mut found: Vec<(SegmentId, PathBuf)> = Vec::new();
        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            let name = entry.file_name();
            if let Some(id) = name.to_str().and_then(parse_segment_id) {
                found.push((id, entry.path()));
            }
        }
        found.sort_by_key(|(id, _)| *id);

        for pair in found.windows(2) {
            if pair[1].0 != pair[0].0.next() {
                return Err(StoreError::corruption(format!(
                    "segment id gap in {}: {} is not followed by {}",
                    dir.display(),
                    pair[0].0,
                    pair[1].0.next()
                )));
            }
        }

        let allocator = Self {
            dir: dir.to_path_buf(),
            capacity,
        };

        let last = found.len().saturating_sub(1);
        let mut segments = Vec::with_capacity(found.len().max(1));
        for (pos, (id, path)) in found.into_iter().enumerate() {
            segments.push(Segment::open(path, id, capacity, pos != last)?);
        }

        if segments.is_empty() {
            segments.push(allocator.allocate(SegmentId::new(1))?);
        }

        Ok((allocator, segments))
    }

    /// Creates a new, empty segment with the given id.
    ///
    /// # Errors
    ///
    /// Returns `Corruption` if a file for that id already exists: ids
    /// are assigned by the single writer, so a collision means the
    /// directory is not in a state the allocator produced.
    pub fn allocate(&self, id: SegmentId) -> StoreResult<Segment> {
        let path = self.dir.join(segment_file_name(id));
        if path.exists() {
            return Err(StoreError::corruption(format!(
                "segment file already exists: {}",
                path.display()
            )));
        }
        debug!(segment = %id, path = %path.display(), "allocating segment");
        Segment::open(path, id, self.capacity, false)
    }

    /// Rolls to a fresh segment if the active one lacks room for the
    /// next record.
    ///
    /// The active segment is the last in `segments`. An empty active
    /// segment never rolls: a record larger than the configured capacity
    /// still gets a segment to itself and is written whole.
    ///
    /// Returns `true` if a roll happened.
    pub fn roll_if_needed(
        &self,
        segments: &mut Vec<Segment>,
        next_record_len: u64,
    ) -> StoreResult<bool> {
        let active = segments
            .last_mut()
            .ok_or_else(|| StoreError::invalid_operation("no active segment"))?;

        if active.size()? == 0 || active.has_room(next_record_len)? {
            return Ok(false);
        }

        active.seal()?;
        let next_id = active.id().next();
        let fresh = self.allocate(next_id)?;
        segments.push(fresh);
        Ok(true)
    }
}
