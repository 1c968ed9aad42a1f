//! Engine Module
//!
//! The storage engine that coordinates the log, the KeyDir and the segments.
//!
//! ## Responsibilities
//! - Rebuild the KeyDir from the log on open
//! - Append durably before publishing anything to the KeyDir
//! - Serve reads straight from KeyDir offsets
//! - Compact the log with merge

use std::fs;
use std::path::Path;

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::{CaskError, Result};
use crate::keydir::{KeyDir, KeyDirEntry};
use crate::log::{sync_parent_dir, LogRecord, LogRecovery, LogWriter};
use crate::storage::{MergeBuilder, MergeOutput, Segment, StorageManager, ACTIVE_FILE_ID};

/// The main storage engine
///
/// ## Concurrency Model: Single-Writer / Multiple-Reader (SWMR)
///
/// - **Writes** (set/delete/merge): Serialized by the `writer` mutex
///   - Encode → append → fsync → KeyDir update happen under one lock
///   - Merge holds it for its whole run, so no write can be lost to the swap
///
/// - **Reads** (get): No writer lock
///   - Segment map read lock + KeyDir read lock, then a positioned read
///   - A value is visible only after its fsync completed
///
/// Lock order: writer → segments → keydir.
pub struct Engine {
    /// Engine configuration
    config: Config,

    /// Key → newest value location (internal RwLock)
    keydir: KeyDir,

    /// Segment read handles (internal RwLock)
    storage: StorageManager,

    /// Append path; `None` once the engine is closed
    writer: Mutex<Option<LogWriter>>,
}

impl Engine {
    /// Open or create an engine with the given config
    ///
    /// On startup:
    /// 1. Create parent directories if configured
    /// 2. Remove a merge file left behind by an interrupted merge
    /// 3. Replay the log into the KeyDir, if it exists
    /// 4. Cut off a torn tail and open the append handle
    /// 5. Ready to serve requests
    pub fn open(config: Config) -> Result<Self> {
        config.validate()?;
        let path = config.path.clone();

        if config.create_dirs {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                fs::create_dir_all(parent)?;
            }
        }

        let merge_path = config.merge_path();
        if merge_path.exists() {
            warn!(path = %merge_path.display(), "removing stale merge file");
            fs::remove_file(&merge_path)?;
        }

        let keydir = KeyDir::new();
        let writer = if path.exists() {
            let result = LogRecovery::recover(&path, ACTIVE_FILE_ID, &keydir)
                .map_err(|e| CaskError::RecoveryFailed(Box::new(e)))?;

            info!(
                path = %path.display(),
                records = result.records_recovered,
                tombstones = result.tombstones,
                live_keys = keydir.len(),
                "log recovered"
            );
            if result.was_truncated {
                warn!(
                    path = %path.display(),
                    valid_len = result.valid_len,
                    discarded = result.discarded_bytes(),
                    "log ends in a partial record"
                );
            }

            LogWriter::open_at(&path, ACTIVE_FILE_ID, result.valid_len)?
        } else {
            info!(path = %path.display(), "creating new log");
            LogWriter::open(&path, ACTIVE_FILE_ID)?
        };

        let storage = StorageManager::open(ACTIVE_FILE_ID, &path)?;

        Ok(Self {
            config,
            keydir,
            storage,
            writer: Mutex::new(Some(writer)),
        })
    }

    /// Open with a path (convenience method)
    ///
    /// Uses default config with the specified log file
    pub fn open_path(path: &Path) -> Result<Self> {
        Self::open(Config::builder().path(path).build())
    }

    /// Get a value by key
    pub fn get(&self, key: &[u8]) -> Result<Vec<u8>> {
        self.storage.get(&self.keydir, key)
    }

    /// Set a key-value pair
    ///
    /// Steps:
    /// 1. Acquire writer lock
    /// 2. Append the record and fsync
    /// 3. Publish the new location to the KeyDir
    ///
    /// Empty values are rejected; an empty value is how tombstones are
    /// stored.
    pub fn set(&self, key: &[u8], value: &[u8]) -> Result<()> {
        if value.is_empty() {
            return Err(CaskError::EmptyValue);
        }

        let mut guard = self.writer.lock();
        let writer = guard.as_mut().ok_or(CaskError::EngineClosed)?;

        let record = LogRecord::new(key, value);
        let position = writer.append(&record)?;

        let entry = KeyDirEntry {
            file_id: writer.file_id(),
            value_pos: position.value_pos,
            value_size: value.len() as u32,
            timestamp: record.timestamp,
        };
        self.keydir.put(record.key, entry);

        debug!(offset = position.offset, size = value.len(), "set");
        Ok(())
    }

    /// Delete a key
    ///
    /// Steps:
    /// 1. Acquire writer lock
    /// 2. Fail with `KeyNotFound` if the key is not live
    /// 3. Append a tombstone and fsync
    /// 4. Remove the key from the KeyDir
    pub fn delete(&self, key: &[u8]) -> Result<()> {
        let mut guard = self.writer.lock();
        let writer = guard.as_mut().ok_or(CaskError::EngineClosed)?;

        if !self.keydir.contains_key(key) {
            return Err(CaskError::KeyNotFound);
        }

        let position = writer.append(&LogRecord::tombstone(key))?;
        self.keydir.delete(key);

        debug!(offset = position.offset, "delete");
        Ok(())
    }

    /// Compact the log down to the live keys
    ///
    /// Steps:
    /// 1. Acquire writer lock (held for the whole merge)
    /// 2. Copy every live value into `{path}.merge`, collecting new offsets
    /// 3. Rename the merge file over the log
    /// 4. Retarget the KeyDir and install the new handles
    ///
    /// If anything fails before the rename, the old log and KeyDir are left
    /// exactly as they were.
    pub fn merge(&self) -> Result<()> {
        let mut guard = self.writer.lock();
        let before = guard.as_ref().ok_or(CaskError::EngineClosed)?.offset();

        let merge_path = self.config.merge_path();
        let output = match self.write_merged(&merge_path) {
            Ok(output) => output,
            Err(e) => {
                discard(&merge_path);
                return Err(e);
            }
        };
        let after = output.bytes_written;

        let (writer, moved) = match self.install_merged(output) {
            Ok(installed) => installed,
            Err(e) => {
                discard(&merge_path);
                return Err(e);
            }
        };
        *guard = Some(writer);

        info!(
            path = %self.config.path.display(),
            before,
            after,
            live_keys = moved,
            "merge complete"
        );

        // Committed at this point
        if let Err(e) = sync_parent_dir(&self.config.path) {
            warn!(
                path = %self.config.path.display(),
                error = %e,
                "failed to sync directory after merge"
            );
        }
        Ok(())
    }

    /// Close the engine
    ///
    /// Syncs the log and releases every handle. Later calls fail with
    /// `EngineClosed`; closing twice is a no-op.
    pub fn close(&self) -> Result<()> {
        let mut guard = self.writer.lock();
        let Some(mut writer) = guard.take() else {
            return Ok(());
        };

        let synced = writer.sync();
        self.storage.close();
        self.keydir.clear();

        info!(path = %self.config.path.display(), "engine closed");
        synced
    }

    // =========================================================================
    // Accessors (for testing and debugging)
    // =========================================================================

    /// Get the log file path
    pub fn path(&self) -> &Path {
        &self.config.path
    }

    /// Get the configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Number of live keys
    pub fn key_count(&self) -> usize {
        self.keydir.len()
    }

    /// Size of the log file in bytes
    pub fn log_size(&self) -> Result<u64> {
        self.storage.segment_len(ACTIVE_FILE_ID)
    }

    pub fn is_closed(&self) -> bool {
        self.writer.lock().is_none()
    }

    // =========================================================================
    // Private Helpers
    // =========================================================================

    /// Write every live key into a new file at `merge_path`
    fn write_merged(&self, merge_path: &Path) -> Result<MergeOutput> {
        let mut snapshot = self.keydir.snapshot();
        snapshot.sort_unstable_by(|a, b| a.0.cmp(&b.0));

        let mut builder =
            MergeBuilder::new(merge_path, ACTIVE_FILE_ID, self.config.merge_timestamps)?;
        for (key, entry) in snapshot {
            let value = self.storage.read_entry(&entry)?;
            builder.add(key, entry, value)?;
        }
        builder.finish()
    }

    /// Swap a finished merge file in for the live log.
    ///
    /// Handles are opened on the merge file first so that, once the rename
    /// lands, nothing can fail before they are installed.
    fn install_merged(&self, output: MergeOutput) -> Result<(LogWriter, usize)> {
        let writer = LogWriter::open(&output.path, ACTIVE_FILE_ID)?;
        let segment = Segment::open(ACTIVE_FILE_ID, &output.path)?;

        let mut moved = 0;
        self.storage.swap(segment, || {
            fs::rename(&output.path, &self.config.path)?;
            moved = self.keydir.retarget(output.updates);
            Ok(())
        })?;
        Ok((writer, moved))
    }
}

/// Remove a partially written merge file
fn discard(path: &Path) {
    if let Err(e) = fs::remove_file(path) {
        if e.kind() != std::io::ErrorKind::NotFound {
            warn!(path = %path.display(), error = %e, "failed to remove merge file");
        }
    }
}
