//! In-memory log index.
//!
//! Maps a log index to the (segment, offset, length) of its record.
//! The index is derived state: it is rebuilt at startup by scanning the
//! segment files and is never persisted.

use crate::error::{StoreError, StoreResult};
use crate::types::IndexEntry;
use std::collections::VecDeque;

/// Ordered, contiguous-by-construction mapping from log index to record
/// location.
///
/// Lookups are O(1): entries are stored densely, so the position of log
/// index `i` is `i - first_index`.
#[derive(Debug, Default)]
pub struct LogIndex {
    entries: VecDeque<IndexEntry>,
}

impl LogIndex {
    /// Creates an empty index.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of indexed entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns whether the index is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns the first (earliest retained) log index, if any.
    #[must_use]
    pub fn first_index(&self) -> Option<u64> {
        self.entries.front().map(|e| e.log_index)
    }

    /// Returns the last log index, if any.
    #[must_use]
    pub fn last_index(&self) -> Option<u64> {
        self.entries.back().map(|e| e.log_index)
    }

    /// Looks up the location of a log index.
    #[must_use]
    pub fn get(&self, log_index: u64) -> Option<IndexEntry> {
        let first = self.first_index()?;
        if log_index < first {
            return None;
        }
        let pos = usize::try_from(log_index - first).ok()?;
        self.entries.get(pos).copied()
    }

    /// Appends a location entry.
    ///
    /// # Errors
    ///
    /// Returns `Corruption` if the entry's log index is not the
    /// successor of the current last index - the contiguity invariant
    /// would be silently broken otherwise.
    pub fn append(&mut self, entry: IndexEntry) -> StoreResult<()> {
        if let Some(last) = self.last_index() {
            if entry.log_index != last + 1 {
                return Err(StoreError::corruption(format!(
                    "non-contiguous log index: {} after {last}",
                    entry.log_index
                )));
            }
        }
        self.entries.push_back(entry);
        Ok(())
    }

    /// Drops every entry with a log index below `cutoff_exclusive`.
    pub fn truncate_prefix(&mut self, cutoff_exclusive: u64) {
        while self
            .entries
            .front()
            .is_some_and(|e| e.log_index < cutoff_exclusive)
        {
            self.entries.pop_front();
        }
    }

    /// Drops every entry with a log index at or above `cutoff_inclusive`.
    pub fn truncate_suffix(&mut self, cutoff_inclusive: u64) {
        while self
            .entries
            .back()
            .is_some_and(|e| e.log_index >= cutoff_inclusive)
        {
            self.entries.pop_back();
        }
    }

    /// Removes all entries, in preparation for a rebuild.
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
