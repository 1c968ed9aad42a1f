//! Segment
//!
//! Read-only handle on one log file. Values are fetched with positioned
//! reads, so concurrent readers never share a file cursor.

use std::fs::File;
use std::io::{self, ErrorKind};
use std::path::Path;

use crate::error::{CaskError, Result};
use crate::keydir::{FileId, KeyDirEntry};

/// An open log segment
#[derive(Debug)]
pub struct Segment {
    file_id: FileId,
    file: File,
}

impl Segment {
    /// Open a segment file for reading
    pub fn open(file_id: FileId, path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        Ok(Self { file_id, file })
    }

    pub fn file_id(&self) -> FileId {
        self.file_id
    }

    /// Current size of the segment file
    pub fn len(&self) -> Result<u64> {
        Ok(self.file.metadata()?.len())
    }

    /// Read exactly the value bytes `entry` points at.
    ///
    /// A short read means the index and the log disagree and is reported as
    /// `CorruptIndex`, never as a shorter value.
    pub fn read_value(&self, entry: &KeyDirEntry) -> Result<Vec<u8>> {
        let mut value = vec![0u8; entry.value_size as usize];
        let mut filled = 0;
        while filled < value.len() {
            match read_at(&self.file, &mut value[filled..], entry.value_pos + filled as u64) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }

        if filled < value.len() {
            return Err(CaskError::CorruptIndex {
                file_id: self.file_id,
                value_pos: entry.value_pos,
                expected: entry.value_size,
                actual: filled,
            });
        }
        Ok(value)
    }
}

#[cfg(unix)]
fn read_at(file: &File, buf: &mut [u8], offset: u64) -> io::Result<usize> {
    use std::os::unix::fs::FileExt;
    file.read_at(buf, offset)
}

#[cfg(windows)]
fn read_at(file: &File, buf: &mut [u8], offset: u64) -> io::Result<usize> {
    use std::os::windows::fs::FileExt;
    file.seek_read(buf, offset)
}
