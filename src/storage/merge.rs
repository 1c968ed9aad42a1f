//! Merge Builder
//!
//! Writes the live records of a KeyDir snapshot into a fresh log file and
//! collects the new locations in a side table. Nothing live is touched until
//! the engine swaps the finished file in.

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::config::MergeTimestamps;
use crate::error::{CaskError, Result};
use crate::keydir::{FileId, KeyDirEntry};
use crate::log::{self, LogRecord};

/// A KeyDir update produced by merge: `(key, snapshot entry, merged entry)`
pub type Retarget = (Vec<u8>, KeyDirEntry, KeyDirEntry);

/// Result of writing a merged log
#[derive(Debug)]
pub struct MergeOutput {
    pub path: PathBuf,
    /// Side table applied to the KeyDir once the file is swapped in
    pub updates: Vec<Retarget>,
    /// Size of the merged file
    pub bytes_written: u64,
}

/// Builder for a merged log file
pub struct MergeBuilder {
    path: PathBuf,
    writer: BufWriter<File>,
    file_id: FileId,
    timestamps: MergeTimestamps,
    merge_time: u32,
    /// Running offset in the new file
    current_offset: u64,
    updates: Vec<Retarget>,
}

impl MergeBuilder {
    /// Create (or truncate) the merge file at `path`
    pub fn new(path: &Path, file_id: FileId, timestamps: MergeTimestamps) -> Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(path)?;

        Ok(Self {
            path: path.to_path_buf(),
            writer: BufWriter::new(file),
            file_id,
            timestamps,
            merge_time: log::now(),
            current_offset: 0,
            updates: Vec::new(),
        })
    }

    /// Copy one live key with its current value into the merged file
    pub fn add(&mut self, key: Vec<u8>, old: KeyDirEntry, value: Vec<u8>) -> Result<()> {
        if value.is_empty() {
            // A live KeyDir entry never points at a tombstone.
            return Err(CaskError::CorruptIndex {
                file_id: old.file_id,
                value_pos: old.value_pos,
                expected: old.value_size,
                actual: 0,
            });
        }

        let timestamp = match self.timestamps {
            MergeTimestamps::Preserve => old.timestamp,
            MergeTimestamps::Refresh => self.merge_time,
        };
        let record = LogRecord::with_timestamp(key, value, timestamp);
        let encoded = record.encode()?;
        self.writer.write_all(&encoded)?;

        let new = KeyDirEntry {
            file_id: self.file_id,
            value_pos: self.current_offset + record.value_offset(),
            value_size: record.value.len() as u32,
            timestamp,
        };
        self.current_offset += encoded.len() as u64;
        self.updates.push((record.key, old, new));

        Ok(())
    }

    /// Flush and fsync the merged file
    pub fn finish(self) -> Result<MergeOutput> {
        let file = self
            .writer
            .into_inner()
            .map_err(|e| CaskError::Io(e.into_error()))?;
        file.sync_all()?;

        Ok(MergeOutput {
            path: self.path,
            updates: self.updates,
            bytes_written: self.current_offset,
        })
    }
}
