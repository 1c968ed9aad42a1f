//! KeyDir Module
//!
//! In-memory index from key to the location of its newest value.
//!
//! ## Responsibilities
//! - O(1) lookup of `(segment, value offset, value size)` for a key
//! - Many concurrent readers, exclusive writers
//! - Copy-out snapshots so merge does not hold the lock while copying
//!
//! ## Data Structure Choice
//! HashMap wrapped in a parking_lot RwLock:
//! - No ordering needed; only point lookups are served
//! - Entries are small `Copy` values, so lock hold time is a struct copy
//! - Holds no value bytes; fully rebuilt from the log on open

mod table;

pub use table::KeyDir;

/// Identifies a log segment
pub type FileId = u32;

/// Location of the newest value for a key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyDirEntry {
    /// Segment holding the value
    pub file_id: FileId,

    /// Absolute offset of the first value byte in the segment
    pub value_pos: u64,

    pub value_size: u32,

    /// Copied from the record (Unix seconds)
    pub timestamp: u32,
}
