//! Log Reader
//!
//! Sequential scan over a log file, tracking the byte offset of every record.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use crate::error::{CaskError, Result};
use super::LogRecord;

/// A decoded record together with where it starts in the file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PositionedRecord {
    /// Byte offset of the record header
    pub offset: u64,
    pub record: LogRecord,
}

impl PositionedRecord {
    /// Absolute offset of the first value byte
    pub fn value_pos(&self) -> u64 {
        self.offset + self.record.value_offset()
    }

    /// Offset just past this record
    pub fn end(&self) -> u64 {
        self.offset + self.record.encoded_len()
    }
}

/// Reads records from the start of a log file
pub struct LogReader {
    reader: BufReader<File>,
    /// Offset of the next record, tracked independently of the file cursor
    offset: u64,
}

impl LogReader {
    /// Open a log file for reading from offset 0
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        Ok(Self {
            reader: BufReader::new(file),
            offset: 0,
        })
    }

    /// Read the next record.
    ///
    /// `Ok(None)` at a clean end of log. A torn tail surfaces as
    /// `TruncatedRecord` and a checksum failure as `CorruptRecord`.
    pub fn next_record(&mut self) -> Result<Option<PositionedRecord>> {
        match LogRecord::decode(&mut self.reader) {
            Ok(record) => {
                let positioned = PositionedRecord {
                    offset: self.offset,
                    record,
                };
                self.offset = positioned.end();
                Ok(Some(positioned))
            }
            Err(CaskError::EndOfLog) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Offset just past the last record read successfully
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Iterate over all complete records, stopping quietly at a torn tail
    pub fn records(self) -> LogIterator {
        LogIterator {
            reader: self,
            done: false,
        }
    }
}

/// Iterator over log records
pub struct LogIterator {
    reader: LogReader,
    done: bool,
}

impl Iterator for LogIterator {
    type Item = Result<PositionedRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.reader.next_record() {
            Ok(Some(record)) => Some(Ok(record)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) if e.is_end_of_log() => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}
