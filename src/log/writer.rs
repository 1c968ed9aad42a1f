//! Log Writer
//!
//! Appends records to the active log file. Every append is fsynced before
//! its position is handed back.

use std::fs::{File, OpenOptions};
use std::io::{self, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use tracing::warn;

use crate::error::Result;
use crate::keydir::FileId;
use super::LogRecord;

/// Where an appended record landed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AppendPosition {
    /// Offset of the record header
    pub offset: u64,
    /// Offset of the first value byte
    pub value_pos: u64,
}

/// Appends records to a log file
pub struct LogWriter {
    file: File,
    file_id: FileId,
    /// End of the last durable record
    offset: u64,
}

impl LogWriter {
    /// Open or create a log file, appending after its current end
    pub fn open(path: &Path, file_id: FileId) -> Result<Self> {
        let created = !path.exists();
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        if created {
            file.sync_all()?;
            sync_parent_dir(path)?;
        }
        let offset = file.metadata()?.len();

        Ok(Self {
            file,
            file_id,
            offset,
        })
    }

    /// Open a log file whose valid data ends at `valid_len`, cutting off
    /// anything after it (a torn tail left by a crash).
    ///
    /// The cut bytes are appended to `torn_path(path)` and fsynced first, so
    /// truncation never destroys data outright.
    pub fn open_at(path: &Path, file_id: FileId, valid_len: u64) -> Result<Self> {
        let mut writer = Self::open(path, file_id)?;
        if writer.offset > valid_len {
            let sidecar = torn_path(path);
            preserve_tail(path, valid_len, &sidecar)?;
            warn!(
                path = %path.display(),
                discarded = writer.offset - valid_len,
                saved_to = %sidecar.display(),
                "truncating torn tail of log"
            );
            writer.file.set_len(valid_len)?;
            writer.file.sync_all()?;
            writer.offset = valid_len;
        }
        Ok(writer)
    }

    /// Append a record and fsync it.
    ///
    /// On failure the file is cut back to its previous end so a half-written
    /// record cannot sit in front of later appends.
    pub fn append(&mut self, record: &LogRecord) -> Result<AppendPosition> {
        let encoded = record.encode()?;
        let start = self.offset;

        let written = self
            .file
            .write_all(&encoded)
            .and_then(|()| self.file.sync_data());
        if let Err(e) = written {
            if let Err(rollback) = self.file.set_len(start) {
                warn!(error = %rollback, offset = start, "failed to roll back torn append");
            }
            return Err(e.into());
        }

        self.offset = start + encoded.len() as u64;
        Ok(AppendPosition {
            offset: start,
            value_pos: start + record.value_offset(),
        })
    }

    /// Force sync to disk
    pub fn sync(&mut self) -> Result<()> {
        self.file.sync_all()?;
        Ok(())
    }

    /// Offset the next record will be written at
    pub fn offset(&self) -> u64 {
        self.offset
    }

    pub fn file_id(&self) -> FileId {
        self.file_id
    }
}

/// Where bytes cut off the end of the log at `path` are kept
pub fn torn_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".torn");
    PathBuf::from(name)
}

/// Copy everything from `from` to the end of `path` onto the end of `sidecar`
fn preserve_tail(path: &Path, from: u64, sidecar: &Path) -> Result<()> {
    let mut source = File::open(path)?;
    source.seek(SeekFrom::Start(from))?;

    let created = !sidecar.exists();
    let mut target = OpenOptions::new().create(true).append(true).open(sidecar)?;
    io::copy(&mut source, &mut target)?;
    target.sync_all()?;
    if created {
        sync_parent_dir(sidecar)?;
    }
    Ok(())
}

/// Make a create or rename inside the parent directory durable
pub(crate) fn sync_parent_dir(path: &Path) -> Result<()> {
    #[cfg(unix)]
    {
        let parent = match path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        File::open(parent)?.sync_all()?;
    }
    #[cfg(not(unix))]
    let _ = path;
    Ok(())
}
