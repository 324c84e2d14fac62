//! Per-kind log store.
//!
//! A [`TypedLogStore`] owns the growing series of segments for one entry
//! kind plus the in-memory [`LogIndex`] over them. All mutation goes
//! through one internal write lock, which is what enforces the
//! single-writer discipline per kind; reads only take the read lock.

use crate::codec;
use crate::error::{StoreError, StoreResult};
use crate::index::LogIndex;
use crate::segment::{Segment, SegmentAllocator};
use crate::types::{EntryKind, IndexEntry, LogEntry, SegmentId};
use parking_lot::RwLock;
use std::path::Path;
use tracing::{info, warn};

/// What recovery found and repaired for one kind.
#[derive(Debug, Clone)]
pub struct RecoverySummary {
    /// The recovered kind.
    pub kind: EntryKind,
    /// Number of segment files scanned.
    pub segments: usize,
    /// Number of complete, checksum-valid records indexed.
    pub records: u64,
    /// Bytes cut from the tail of the last segment (torn write repair).
    pub truncated_bytes: u64,
}

/// Log store for a single entry kind.
pub struct TypedLogStore {
    kind: EntryKind,
    inner: RwLock<StoreInner>,
}

struct StoreInner {
    allocator: SegmentAllocator,
    segments: Vec<Segment>,
    index: LogIndex,
    /// The index the next append will be assigned. Starts at 1.
    next_index: u64,
    sync_on_append: bool,
    recovered: bool,
}

impl TypedLogStore {
    /// Opens the store over a kind directory.
    ///
    /// The store accepts no appends or reads until [`recover`] has
    /// completed.
    ///
    /// [`recover`]: TypedLogStore::recover
    pub fn open(
        kind: EntryKind,
        dir: &Path,
        segment_size: u64,
        sync_on_append: bool,
    ) -> StoreResult<Self> {
        let (allocator, segments) = SegmentAllocator::open(dir, segment_size)?;
        Ok(Self {
            kind,
            inner: RwLock::new(StoreInner {
                allocator,
                segments,
                index: LogIndex::new(),
                next_index: 1,
                sync_on_append,
                recovered: false,
            }),
        })
    }

    /// Returns the kind this store holds.
    #[must_use]
    pub fn kind(&self) -> EntryKind {
        self.kind
    }

    /// Rebuilds the in-memory index from the segment files.
    ///
    /// Segments are scanned in ascending id order. A decode failure in
    /// the last segment is the torn-write signature of an unclean
    /// shutdown: the index is built up to but excluding that record and
    /// the file is truncated at its byte offset, so repeating recovery
    /// is a no-op. A decode failure anywhere else is real damage and is
    /// surfaced as `Corruption` instead of being auto-repaired.
    pub fn recover(&self) -> StoreResult<RecoverySummary> {
        let mut guard = self.inner.write();
        let inner = &mut *guard;
        inner.index.clear();

        let segment_count = inner.segments.len();
        let mut truncated_bytes = 0u64;

        for pos in 0..segment_count {
            let is_last = pos + 1 == segment_count;
            let segment_id = inner.segments[pos].id();
            let size = inner.segments[pos].size()?;
            let mut offset = 0u64;

            while offset < size {
                match read_record_at(&inner.segments[pos], offset, size - offset) {
                    Ok((entry, consumed)) => {
                        if entry.kind != self.kind {
                            return Err(StoreError::corruption(format!(
                                "{} record in {} log, {segment_id} at offset {offset}",
                                entry.kind, self.kind
                            )));
                        }
                        inner.index.append(IndexEntry {
                            log_index: entry.index,
                            segment_id,
                            offset,
                            len: consumed as u32,
                        })?;
                        offset += consumed as u64;
                    }
                    Err(StoreError::Corruption { .. }) | Err(StoreError::ChecksumMismatch { .. })
                        if !is_last =>
                    {
                        let message = format!(
                            "mid-file corruption in {} log, {segment_id} at offset {offset}",
                            self.kind
                        );
                        warn!(kind = %self.kind, segment = %segment_id, offset, "{message}");
                        return Err(StoreError::Corruption { message });
                    }
                    Err(StoreError::Corruption { .. }) | Err(StoreError::ChecksumMismatch { .. }) => {
                        // Torn tail write: cut the file back to the last
                        // complete record.
                        truncated_bytes = size - offset;
                        inner.segments[pos].truncate(offset)?;
                        warn!(
                            kind = %self.kind,
                            segment = %segment_id,
                            offset,
                            truncated_bytes,
                            "truncated torn tail record during recovery"
                        );
                        break;
                    }
                    Err(other) => return Err(other),
                }
            }
        }

        inner.next_index = inner.index.last_index().map_or(1, |last| last + 1);
        inner.recovered = true;

        let summary = RecoverySummary {
            kind: self.kind,
            segments: segment_count,
            records: inner.index.len() as u64,
            truncated_bytes,
        };
        info!(
            kind = %self.kind,
            segments = summary.segments,
            records = summary.records,
            truncated_bytes = summary.truncated_bytes,
            "log recovery complete"
        );
        Ok(summary)
    }

    /// Appends an entry, assigning it the next sequential index.
    ///
    /// Returns the assigned index. The entry is not durable until
    /// [`flush`] returns.
    ///
    /// [`flush`]: TypedLogStore::flush
    pub fn append(&self, term: u64, payload: Vec<u8>) -> StoreResult<u64> {
        let mut guard = self.inner.write();
        let inner = &mut *guard;
        check_recovered(inner)?;
        let index = inner.next_index;
        append_record(inner, self.kind, index, term, payload)
    }

    /// Appends an entry at an explicit index (follower replication).
    ///
    /// # Errors
    ///
    /// Returns `OutOfOrderAppend` if `index` is not exactly the next
    /// expected index. The store never reorders or retries.
    pub fn append_at(&self, index: u64, term: u64, payload: Vec<u8>) -> StoreResult<u64> {
        let mut guard = self.inner.write();
        let inner = &mut *guard;
        check_recovered(inner)?;
        if index != inner.next_index {
            return Err(StoreError::OutOfOrderAppend {
                expected: inner.next_index,
                actual: index,
            });
        }
        append_record(inner, self.kind, index, term, payload)
    }

    /// Forces the active segment's data to stable storage.
    ///
    /// This is the durability boundary: callers must flush before
    /// treating appended entries as committed, and may batch several
    /// appends per flush.
    pub fn flush(&self) -> StoreResult<()> {
        let mut guard = self.inner.write();
        let inner = &mut *guard;
        check_recovered(inner)?;
        if let Some(active) = inner.segments.last_mut() {
            active.sync()?;
        }
        Ok(())
    }

    /// Reads the entry at `log_index`.
    ///
    /// # Errors
    ///
    /// - `NotFound` if the index is below the retention watermark or
    ///   above the last index
    /// - `Corruption`/`ChecksumMismatch` if the indexed record fails to
    ///   decode - a fatal storage-integrity fault, never retried
    pub fn get(&self, log_index: u64) -> StoreResult<LogEntry> {
        let inner = self.inner.read();
        check_recovered(&inner)?;

        let location = inner
            .index
            .get(log_index)
            .ok_or_else(|| StoreError::not_found(self.kind, log_index))?;
        let segment = segment_by_id(&inner.segments, location.segment_id)?;

        let bytes = segment.read_at(location.offset, location.len as usize)?;
        let (entry, consumed) = codec::decode(&bytes)?;
        if consumed != bytes.len() || entry.index != log_index {
            return Err(StoreError::corruption(format!(
                "index entry for {log_index} resolved to record {} ({consumed} of {} bytes)",
                entry.index,
                bytes.len()
            )));
        }
        Ok(entry)
    }

    /// Returns the term of the entry at `log_index`.
    pub fn term_of(&self, log_index: u64) -> StoreResult<u64> {
        Ok(self.get(log_index)?.term)
    }

    /// Deletes every segment that lies entirely below `cutoff_exclusive`.
    ///
    /// Truncation granularity is segment-level: a segment straddling the
    /// cutoff is retained whole on disk, while the in-memory index and
    /// [`first_index`] advance to the cutoff immediately.
    ///
    /// [`first_index`]: TypedLogStore::first_index
    pub fn truncate_prefix(&self, cutoff_exclusive: u64) -> StoreResult<()> {
        let mut guard = self.inner.write();
        let inner = &mut *guard;
        check_recovered(inner)?;

        let cutoff = cutoff_exclusive.min(inner.next_index);
        let Some(first) = inner.index.first_index() else {
            return Ok(());
        };
        if cutoff <= first {
            return Ok(());
        }

        inner.index.truncate_prefix(cutoff);

        // The first segment still referenced by the index (or the active
        // segment, if the whole index was dropped) bounds the deletion.
        let keep_from = match inner.index.get(cutoff) {
            Some(location) => location.segment_id,
            None => match inner.segments.last() {
                Some(active) => active.id(),
                None => return Ok(()),
            },
        };

        let mut deleted = 0usize;
        while inner.segments.first().is_some_and(|s| s.id() < keep_from) {
            let segment = inner.segments.remove(0);
            segment.delete()?;
            deleted += 1;
        }

        info!(
            kind = %self.kind,
            cutoff,
            deleted_segments = deleted,
            "prefix truncation complete"
        );
        Ok(())
    }

    /// Discards every entry at or after `cutoff_inclusive`.
    ///
    /// The segment containing the cutoff is truncated at the record's
    /// byte offset and becomes the active segment; every later segment
    /// is deleted. The next append is assigned `cutoff_inclusive`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidOperation` if the cutoff lies below the retention
    /// watermark - rolling back into a compacted range needs a snapshot,
    /// not a truncation.
    pub fn truncate_suffix(&self, cutoff_inclusive: u64) -> StoreResult<()> {
        let mut guard = self.inner.write();
        let inner = &mut *guard;
        check_recovered(inner)?;

        if cutoff_inclusive >= inner.next_index {
            return Ok(());
        }

        let first = inner.index.first_index();
        let below_watermark = match first {
            Some(first) => cutoff_inclusive < first,
            None => true,
        };
        if below_watermark {
            return Err(StoreError::invalid_operation(format!(
                "suffix truncation at {cutoff_inclusive} is below the retention watermark"
            )));
        }

        let location = inner.index.get(cutoff_inclusive).ok_or_else(|| {
            StoreError::corruption(format!("no index entry for retained index {cutoff_inclusive}"))
        })?;

        let mut deleted = 0usize;
        while inner
            .segments
            .last()
            .is_some_and(|s| s.id() > location.segment_id)
        {
            let segment = inner.segments.pop().ok_or_else(|| {
                StoreError::invalid_operation("no segments to truncate")
            })?;
            segment.delete()?;
            deleted += 1;
        }

        let active = inner
            .segments
            .last_mut()
            .ok_or_else(|| StoreError::invalid_operation("no active segment"))?;
        active.truncate(location.offset)?;
        active.unseal();

        inner.index.truncate_suffix(cutoff_inclusive);
        inner.next_index = cutoff_inclusive;

        info!(
            kind = %self.kind,
            cutoff = cutoff_inclusive,
            deleted_segments = deleted,
            "suffix truncation complete"
        );
        Ok(())
    }

    /// Returns the earliest retained index (the retention watermark).
    ///
    /// For an empty log this equals [`next_index`].
    ///
    /// [`next_index`]: TypedLogStore::next_index
    pub fn first_index(&self) -> StoreResult<u64> {
        let inner = self.inner.read();
        check_recovered(&inner)?;
        Ok(inner.index.first_index().unwrap_or(inner.next_index))
    }

    /// Returns the last appended index, or 0 for an empty fresh log.
    pub fn last_index(&self) -> StoreResult<u64> {
        let inner = self.inner.read();
        check_recovered(&inner)?;
        Ok(inner.index.last_index().unwrap_or(inner.next_index - 1))
    }

    /// Returns the index the next append will be assigned.
    pub fn next_index(&self) -> StoreResult<u64> {
        let inner = self.inner.read();
        check_recovered(&inner)?;
        Ok(inner.next_index)
    }

    /// Returns `(first_index, last_index)` read under a single lock
    /// acquisition, so the pair is a consistent snapshot even when a
    /// truncation races the caller.
    pub fn index_bounds(&self) -> StoreResult<(u64, u64)> {
        let inner = self.inner.read();
        check_recovered(&inner)?;
        let first = inner.index.first_index().unwrap_or(inner.next_index);
        let last = inner.index.last_index().unwrap_or(inner.next_index - 1);
        Ok((first, last))
    }
}

impl std::fmt::Debug for TypedLogStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TypedLogStore")
            .field("kind", &self.kind)
            .finish_non_exhaustive()
    }
}

fn check_recovered(inner: &StoreInner) -> StoreResult<()> {
    if !inner.recovered {
        return Err(StoreError::invalid_operation(
            "store has not been recovered yet",
        ));
    }
    Ok(())
}

fn segment_by_id(segments: &[Segment], id: SegmentId) -> StoreResult<&Segment> {
    let first = segments
        .first()
        .ok_or_else(|| StoreError::invalid_operation("no segments"))?
        .id();
    // Live ids are gap-free, so position is id arithmetic.
    let pos = id.as_u32().checked_sub(first.as_u32()).map(|p| p as usize);
    pos.and_then(|p| segments.get(p))
        .filter(|s| s.id() == id)
        .ok_or_else(|| StoreError::corruption(format!("index references missing segment {id}")))
}

fn append_record(
    inner: &mut StoreInner,
    kind: EntryKind,
    index: u64,
    term: u64,
    payload: Vec<u8>,
) -> StoreResult<u64> {
    let entry = LogEntry {
        index,
        term,
        kind,
        payload,
    };
    let record = codec::encode(&entry)?;

    inner
        .allocator
        .roll_if_needed(&mut inner.segments, record.len() as u64)?;

    let (segment_id, offset) = {
        let active = inner
            .segments
            .last_mut()
            .ok_or_else(|| StoreError::invalid_operation("no active segment"))?;
        let offset = active.append(&record)?;
        (active.id(), offset)
    };

    inner.index.append(IndexEntry {
        log_index: index,
        segment_id,
        offset,
        len: record.len() as u32,
    })?;
    inner.next_index = index + 1;

    if inner.sync_on_append {
        if let Some(active) = inner.segments.last_mut() {
            active.sync()?;
        }
    }

    Ok(index)
}

/// Reads and decodes one record at `offset`, given `remaining` bytes to
/// the end of the segment. Short reads surface as the codec's truncated
/// record error.
fn read_record_at(segment: &Segment, offset: u64, remaining: u64) -> StoreResult<(LogEntry, usize)> {
    let header_len = (remaining as usize).min(codec::HEADER_SIZE);
    let header = segment.read_at(offset, header_len)?;
    if header.len() < codec::HEADER_SIZE {
        // Not enough bytes for a header; let the codec produce the
        // canonical truncated-record error.
        return codec::decode(&header);
    }

    let payload_len = u32::from_le_bytes([header[7], header[8], header[9], header[10]]) as usize;
    let total_len = codec::encoded_len(payload_len);
    if (total_len as u64) > remaining {
        return codec::decode(&header);
    }

    let bytes = segment.read_at(offset, total_len)?;
    codec::decode(&bytes)
}


#[cfg(test)]
mod prop_tests {
    use super::*;
    use proptest::prelude::*;
    use tempfile::tempdir;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        #[test]
        fn append_get_roundtrip_at_any_capacity(
            payloads in proptest::collection::vec(
                proptest::collection::vec(any::<u8>(), 0..256),
                1..40,
            ),
            capacity in 64u64..2048,
        ) {
            let dir = tempdir().unwrap();
            let store =
                TypedLogStore::open(EntryKind::Data, dir.path(), capacity, false).unwrap();
            store.recover().unwrap();

            for (i, payload) in payloads.iter().enumerate() {
                let assigned = store.append(1, payload.clone()).unwrap();
                prop_assert_eq!(assigned, i as u64 + 1);
            }
            store.flush().unwrap();

            prop_assert_eq!(store.last_index().unwrap(), payloads.len() as u64);
            for (i, payload) in payloads.iter().enumerate() {
                let entry = store.get(i as u64 + 1).unwrap();
                prop_assert_eq!(&entry.payload, payload);
            }
        }
    }
}
