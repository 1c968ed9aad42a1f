//! Storage Module
//!
//! Read side of the log and compaction.
//!
//! ## Responsibilities
//! - Hold one read-only handle per segment (`FileId -> Segment`)
//! - O(1) point reads at KeyDir offsets, bypassing record parsing
//! - Build merged segments that drop overwritten and deleted data
//! - Swap a merged segment in atomically with respect to readers
//!
//! ## Segments
//! The engine writes a single segment (`ACTIVE_FILE_ID`). The map and the
//! `file_id` carried by every KeyDir entry are where rotation would plug in.

mod segment;
mod manager;
mod merge;

pub use segment::Segment;
pub use manager::StorageManager;
pub use merge::{MergeBuilder, MergeOutput, Retarget};

use crate::keydir::FileId;

/// FileId of the single live segment
pub const ACTIVE_FILE_ID: FileId = 0;
