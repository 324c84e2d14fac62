//! Core type definitions for the log engine.

use std::fmt;

/// The kind of a log entry.
///
/// The engine keeps a fully independent segmented log per kind: data
/// entries (state-machine mutations) and configuration entries (cluster
/// membership changes) never share files or indices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum EntryKind {
    /// A state-mutating data entry.
    Data = 1,
    /// A cluster configuration-change entry.
    Configuration = 2,
}

impl EntryKind {
    /// All recognized entry kinds, in recovery order (configuration first).
    pub const ALL: [Self; 2] = [Self::Configuration, Self::Data];

    /// Converts a byte to an entry kind.
    #[must_use]
    pub fn from_byte(b: u8) -> Option<Self> {
        match b {
            1 => Some(Self::Data),
            2 => Some(Self::Configuration),
            _ => None,
        }
    }

    /// Converts the entry kind to a byte.
    #[must_use]
    pub const fn as_byte(self) -> u8 {
        self as u8
    }

    /// Returns the directory name holding this kind's segments.
    #[must_use]
    pub const fn dir_name(self) -> &'static str {
        match self {
            Self::Data => "data",
            Self::Configuration => "configuration",
        }
    }
}

impl fmt::Display for EntryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.dir_name())
    }
}

/// Identifier for a segment file.
///
/// Segment ids are monotonically increasing per kind. The live set of
/// ids is always gap-free; a new segment is numbered as the successor of
/// the highest live id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SegmentId(pub u32);

impl SegmentId {
    /// Creates a new segment ID.
    #[must_use]
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    /// Returns the raw ID value.
    #[must_use]
    pub const fn as_u32(self) -> u32 {
        self.0
    }

    /// Returns the next segment ID.
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Display for SegmentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "seg:{}", self.0)
    }
}

/// A single replicated-log entry.
///
/// An entry is immutable once flushed; it is removed only by prefix or
/// suffix truncation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    /// Log index, strictly increasing by 1 within a kind.
    pub index: u64,
    /// Consensus term the entry was appended under.
    pub term: u64,
    /// The entry kind.
    pub kind: EntryKind,
    /// Opaque payload bytes.
    pub payload: Vec<u8>,
}

/// Location of one record within the segment files of a kind.
///
/// Derived state: never persisted, always reconstructable by scanning
/// the segment files.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexEntry {
    /// Log index of the record.
    pub log_index: u64,
    /// Segment holding the record.
    pub segment_id: SegmentId,
    /// Byte offset of the record within its segment.
    pub offset: u64,
    /// Total encoded record length in bytes.
    pub len: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entry_kind_roundtrip() {
        for kind in EntryKind::ALL {
            assert_eq!(EntryKind::from_byte(kind.as_byte()), Some(kind));
        }
        assert_eq!(EntryKind::from_byte(0), None);
        assert_eq!(EntryKind::from_byte(3), None);
    }

    #[test]
    fn recovery_order_is_configuration_first() {
        assert_eq!(EntryKind::ALL[0], EntryKind::Configuration);
    }

    #[test]
    fn segment_id_next() {
        let id = SegmentId::new(5);
        assert_eq!(id.next().as_u32(), 6);
        assert!(id < id.next());
    }

    #[test]
    fn entry_kind_display() {
        assert_eq!(format!("{}", EntryKind::Data), "data");
        assert_eq!(format!("{}", EntryKind::Configuration), "configuration");
    }
}
