//! # Quill Core
//!
//! Storage engine for replicated consensus logs.
//!
//! This crate provides:
//! - Checksummed, length-framed record encoding
//! - Bounded segment files with monotonic ids per entry kind
//! - An in-memory index rebuilt by scanning segments at startup
//! - Crash recovery with torn-tail repair
//! - Prefix (compaction) and suffix (conflict rewind) truncation
//!
//! The entry point is [`LogStorage`], which keeps one fully independent
//! log per [`EntryKind`]:
//!
//! ```no_run
//! use quill_core::{Config, EntryKind, LogStorage};
//!
//! # fn main() -> quill_core::StoreResult<()> {
//! let storage = LogStorage::open("/var/lib/quill".as_ref(), Config::default())?;
//! let index = storage.append(EntryKind::Data, 1, b"payload".to_vec())?;
//! storage.flush(EntryKind::Data)?;
//! assert_eq!(storage.get(EntryKind::Data, index)?.payload, b"payload");
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod codec;
pub mod config;
pub mod dir;
pub mod error;
pub mod index;
pub mod segment;
pub mod storage;
pub mod store;
pub mod types;

pub use config::Config;
pub use error::{StoreError, StoreResult};
pub use storage::LogStorage;
pub use store::{RecoverySummary, TypedLogStore};
pub use types::{EntryKind, IndexEntry, LogEntry, SegmentId};
