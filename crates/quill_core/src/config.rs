//! Engine configuration.

use crate::types::EntryKind;

/// Configuration for opening a log store.
#[derive(Debug, Clone)]
pub struct Config {
    /// Whether to create the store directory if it doesn't exist.
    pub create_if_missing: bool,

    /// Maximum size of a data-log segment file before rolling.
    pub data_segment_size: u64,

    /// Maximum size of a configuration-log segment file before rolling.
    ///
    /// Configuration entries are small and rare, so their files are
    /// sized well below the data-log segments.
    pub configuration_segment_size: u64,

    /// Whether to sync after every append (safer but slower).
    ///
    /// When false, durability is the caller's responsibility via
    /// `flush` - the usual group-commit arrangement.
    pub sync_on_append: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            create_if_missing: true,
            data_segment_size: 64 * 1024 * 1024,         // 64 MiB
            configuration_segment_size: 4 * 1024 * 1024, // 4 MiB
            sync_on_append: false,
        }
    }
}

impl Config {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets whether to create the store directory if missing.
    #[must_use]
    pub const fn create_if_missing(mut self, value: bool) -> Self {
        self.create_if_missing = value;
        self
    }

    /// Sets the maximum data-log segment file size.
    #[must_use]
    pub const fn data_segment_size(mut self, size: u64) -> Self {
        self.data_segment_size = size;
        self
    }

    /// Sets the maximum configuration-log segment file size.
    #[must_use]
    pub const fn configuration_segment_size(mut self, size: u64) -> Self {
        self.configuration_segment_size = size;
        self
    }

    /// Sets whether to sync after every append.
    #[must_use]
    pub const fn sync_on_append(mut self, value: bool) -> Self {
        self.sync_on_append = value;
        self
    }

    /// Returns the segment capacity for the given kind.
    #[must_use]
    pub const fn segment_size_for(&self, kind: EntryKind) -> u64 {
        match kind {
            EntryKind::Data => self.data_segment_size,
            EntryKind::Configuration => self.configuration_segment_size,
        }
    }
}
