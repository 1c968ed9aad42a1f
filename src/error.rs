//! Error types for CaskKV
//!
//! Provides a unified error type for all operations.

use thiserror::Error;

use crate::keydir::FileId;

/// Result type alias using CaskError
pub type Result<T> = std::result::Result<T, CaskError>;

/// Unified error type for CaskKV operations
#[derive(Debug, Error)]
pub enum CaskError {
    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // -------------------------------------------------------------------------
    // Log Codec Errors
    // -------------------------------------------------------------------------
    /// Stored checksum does not match the bytes that were read
    #[error("corrupt record: checksum {actual:#010x} does not match stored {expected:#010x}")]
    CorruptRecord { expected: u32, actual: u32 },

    /// The log ended in the middle of a record (torn write)
    #[error("truncated record: expected {expected} bytes, found {actual}")]
    TruncatedRecord { expected: u64, actual: u64 },

    /// The log has no more records; not a failure for the caller
    #[error("end of log")]
    EndOfLog,

    #[error("{field} of {len} bytes does not fit in a log record")]
    RecordTooLarge { field: &'static str, len: usize },

    // -------------------------------------------------------------------------
    // Engine Errors
    // -------------------------------------------------------------------------
    #[error("Key not found")]
    KeyNotFound,

    /// Empty values are reserved for tombstones
    #[error("value must not be empty")]
    EmptyValue,

    /// The KeyDir points at bytes the log cannot provide
    #[error("corrupt index: segment {file_id} at offset {value_pos} holds {actual} of {expected} value bytes")]
    CorruptIndex {
        file_id: FileId,
        value_pos: u64,
        expected: u32,
        actual: usize,
    },

    #[error("recovery failed: {0}")]
    RecoveryFailed(#[source] Box<CaskError>),

    #[error("engine is closed")]
    EngineClosed,

    // -------------------------------------------------------------------------
    // Configuration Errors
    // -------------------------------------------------------------------------
    #[error("Configuration error: {0}")]
    Config(String),
}

impl CaskError {
    /// True for the signals that mark the end of valid log data
    /// (clean end or torn tail) rather than a failure.
    pub fn is_end_of_log(&self) -> bool {
        matches!(self, CaskError::EndOfLog | CaskError::TruncatedRecord { .. })
    }
}
