//! Storage Manager
//!
//! Owns the open segment handles and coordinates reads with segment swaps.
//!
//! ## Responsibilities
//! - Map each FileId to its read handle
//! - Serve point reads straight from KeyDir offsets
//! - Swap a merged segment in without readers seeing a mismatched
//!   (offset, file) pair

use std::collections::HashMap;
use std::path::Path;

use parking_lot::RwLock;

use crate::error::{CaskError, Result};
use crate::keydir::{FileId, KeyDir, KeyDirEntry};

use super::Segment;

/// Manages the segment read handles
///
/// ## Concurrency:
/// - `segments`: Protected by RwLock
///   - Reads hold the read lock across the KeyDir lookup and the file read
///   - A swap holds the write lock across rename and KeyDir retargeting
/// - An empty map means the engine has been closed
pub struct StorageManager {
    segments: RwLock<HashMap<FileId, Segment>>,
}

impl StorageManager {
    /// Open storage with a single segment
    pub fn open(file_id: FileId, path: &Path) -> Result<Self> {
        let segment = Segment::open(file_id, path)?;
        let mut segments = HashMap::new();
        segments.insert(file_id, segment);

        Ok(Self {
            segments: RwLock::new(segments),
        })
    }

    /// Look up `key` in `keydir` and read its value.
    ///
    /// The KeyDir is consulted under the segment read lock so a concurrent
    /// swap cannot retarget the entry between lookup and read.
    pub fn get(&self, keydir: &KeyDir, key: &[u8]) -> Result<Vec<u8>> {
        let segments = self.segments.read();
        if segments.is_empty() {
            return Err(CaskError::EngineClosed);
        }

        let entry = keydir.get(key).ok_or(CaskError::KeyNotFound)?;
        Self::read_from(&segments, &entry)
    }

    /// Read the value an entry points at
    pub fn read_entry(&self, entry: &KeyDirEntry) -> Result<Vec<u8>> {
        let segments = self.segments.read();
        if segments.is_empty() {
            return Err(CaskError::EngineClosed);
        }
        Self::read_from(&segments, entry)
    }

    /// Replace the segment for `segment.file_id()`.
    ///
    /// `commit` runs under the write lock (rename, KeyDir retargeting); the
    /// new handle is installed only if it succeeds. On failure the old
    /// segment stays in place.
    pub fn swap<F>(&self, segment: Segment, commit: F) -> Result<()>
    where
        F: FnOnce() -> Result<()>,
    {
        let mut segments = self.segments.write();
        if segments.is_empty() {
            return Err(CaskError::EngineClosed);
        }

        commit()?;
        segments.insert(segment.file_id(), segment);
        Ok(())
    }

    /// Size of a segment file in bytes
    pub fn segment_len(&self, file_id: FileId) -> Result<u64> {
        let segments = self.segments.read();
        match segments.get(&file_id) {
            Some(segment) => segment.len(),
            None if segments.is_empty() => Err(CaskError::EngineClosed),
            None => Ok(0),
        }
    }

    /// Get the number of open segments
    pub fn segment_count(&self) -> usize {
        self.segments.read().len()
    }

    /// Drop every handle; later reads fail with `EngineClosed`
    pub fn close(&self) {
        self.segments.write().clear();
    }

    // =========================================================================
    // Private Helpers
    // =========================================================================

    fn read_from(segments: &HashMap<FileId, Segment>, entry: &KeyDirEntry) -> Result<Vec<u8>> {
        match segments.get(&entry.file_id) {
            Some(segment) => segment.read_value(entry),
            None => Err(CaskError::CorruptIndex {
                file_id: entry.file_id,
                value_pos: entry.value_pos,
                expected: entry.value_size,
                actual: 0,
            }),
        }
    }
}
