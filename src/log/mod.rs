//! Log Module
//!
//! The append-only log: record codec, sequential reader, writer and recovery.
//!
//! ## Responsibilities
//! - Encode/decode records with a CRC32 over everything after the checksum
//! - Append records and fsync before acknowledging
//! - Detect torn tails and checksum failures on replay
//! - Rebuild the KeyDir on open
//!
//! ## File Format
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │ Record 1                                                     │
//! │ ┌─────────┬──────────┬──────────┬──────────┬─────┬─────────┐ │
//! │ │ CRC (4) │ Time (4) │KeyLen (4)│ValLen (4)│ Key │  Value  │ │
//! │ └─────────┴──────────┴──────────┴──────────┴─────┴─────────┘ │
//! ├──────────────────────────────────────────────────────────────┤
//! │ Record 2 ...                                                 │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//! All integers are little-endian. `ValLen == 0` marks a tombstone.

mod entry;
mod writer;
mod reader;
mod recovery;

pub use entry::{encode, now, LogRecord, HEADER_SIZE};
pub use writer::{torn_path, AppendPosition, LogWriter};
pub(crate) use writer::sync_parent_dir;
pub use reader::{LogIterator, LogReader, PositionedRecord};
pub use recovery::{LogRecovery, RecoveryResult};
