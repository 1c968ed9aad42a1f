//! # CaskKV
//!
//! A log-structured key-value storage engine in the Bitcask style:
//! - Append-only log with CRC32-checked records
//! - In-memory KeyDir for O(1) point reads
//! - Crash recovery with torn-tail handling
//! - Tombstone deletes and merge (compaction)
//! - Single-writer/multi-reader concurrency model
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                          Engine                              │
//! │            set / get / delete / merge / close                │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//!          ┌────────────┼─────────────────────┐
//!          │            │                     │
//!          ▼            ▼                     ▼
//!   ┌─────────────┐ ┌─────────────┐   ┌──────────────┐
//!   │  LogWriter  │ │   KeyDir    │   │   Storage    │
//!   │(Mutex, sync)│ │  (RwLock)   │   │  (segments)  │
//!   └──────┬──────┘ └─────────────┘   └──────┬───────┘
//!          │                                 │ positioned reads
//!          ▼                                 ▼
//!   ┌─────────────────────────────────────────────────┐
//!   │              append-only log file               │
//!   └─────────────────────────────────────────────────┘
//! ```
//!
//! ## Example
//!
//! ```no_run
//! use caskkv::Engine;
//!
//! # fn main() -> caskkv::Result<()> {
//! let engine = Engine::open_path(std::path::Path::new("data.db"))?;
//! engine.set(b"hello", b"world")?;
//! assert_eq!(engine.get(b"hello")?, b"world".to_vec());
//! engine.delete(b"hello")?;
//! engine.merge()?;
//! engine.close()?;
//! # Ok(())
//! # }
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod log;
pub mod keydir;
pub mod storage;
pub mod engine;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{CaskError, Result};
pub use config::{Config, MergeTimestamps};
pub use engine::Engine;

// =============================================================================
// Version Info
// =============================================================================

/// Current version of CaskKV
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
