//! Log Recovery
//!
//! Rebuilds the KeyDir by replaying the log from offset 0.

use std::path::Path;

use crate::error::Result;
use crate::keydir::{FileId, KeyDir, KeyDirEntry};
use super::reader::{LogReader, PositionedRecord};

/// Replays a log file into a KeyDir
pub struct LogRecovery;

/// Result of a recovery operation
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RecoveryResult {
    /// Number of complete records replayed (values and tombstones)
    pub records_recovered: u64,

    /// How many of those were tombstones
    pub tombstones: u64,

    /// Length of the valid prefix; appends resume here
    pub valid_len: u64,

    /// Length of the file as found on disk
    pub file_len: u64,

    /// Whether a torn tail follows the valid prefix
    pub was_truncated: bool,
}

impl RecoveryResult {
    /// Bytes after the last complete record
    pub fn discarded_bytes(&self) -> u64 {
        self.file_len - self.valid_len
    }
}

impl LogRecovery {
    /// Recover a log file into `keydir`
    ///
    /// This will:
    /// 1. Read records in file order
    /// 2. Put values and drop tombstoned keys, so the last write wins
    /// 3. Stop at the end of log or at a torn tail
    /// 4. Fail on a checksum mismatch, since nothing after it can be trusted
    ///
    /// The file is not modified; the caller truncates the torn tail.
    pub fn recover(path: &Path, file_id: FileId, keydir: &KeyDir) -> Result<RecoveryResult> {
        Self::scan(path, |positioned| {
            let record = &positioned.record;
            if record.is_tombstone() {
                keydir.delete(&record.key);
            } else {
                keydir.put(
                    record.key.clone(),
                    KeyDirEntry {
                        file_id,
                        value_pos: positioned.value_pos(),
                        value_size: record.value.len() as u32,
                        timestamp: record.timestamp,
                    },
                );
            }
        })
    }

    /// Check the integrity of a log file without building an index
    pub fn verify(path: &Path) -> Result<RecoveryResult> {
        Self::scan(path, |_| {})
    }

    fn scan<F>(path: &Path, mut apply: F) -> Result<RecoveryResult>
    where
        F: FnMut(&PositionedRecord),
    {
        let file_len = std::fs::metadata(path)?.len();
        let mut reader = LogReader::open(path)?;
        let mut result = RecoveryResult {
            file_len,
            ..RecoveryResult::default()
        };

        loop {
            match reader.next_record() {
                Ok(Some(positioned)) => {
                    if positioned.record.is_tombstone() {
                        result.tombstones += 1;
                    }
                    apply(&positioned);
                    result.records_recovered += 1;
                }
                Ok(None) => break,
                Err(e) if e.is_end_of_log() => {
                    result.was_truncated = true;
                    break;
                }
                Err(e) => return Err(e),
            }
        }

        result.valid_len = reader.offset();
        Ok(result)
    }
}
