//! Configuration for CaskKV
//!
//! Centralized configuration with sensible defaults.

use std::path::PathBuf;

use crate::error::{CaskError, Result};

/// Main configuration for a CaskKV engine
#[derive(Debug, Clone)]
pub struct Config {
    // -------------------------------------------------------------------------
    // Storage Configuration
    // -------------------------------------------------------------------------
    /// The append-only log file.
    /// Layout on disk:
    ///   {path}          (live log segment)
    ///   {path}.merge    (only while a merge is running)
    pub path: PathBuf,

    /// Create missing parent directories of `path` on open
    pub create_dirs: bool,

    // -------------------------------------------------------------------------
    // Merge Configuration
    // -------------------------------------------------------------------------
    /// Timestamp carried by records rewritten during merge
    pub merge_timestamps: MergeTimestamps,
}

/// Timestamp policy for records rewritten by merge
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeTimestamps {
    /// Keep the timestamp of the record being copied
    Preserve,

    /// Stamp every rewritten record with the merge time
    Refresh,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            path: PathBuf::from("./caskkv.db"),
            create_dirs: true,
            merge_timestamps: MergeTimestamps::Preserve,
        }
    }
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Path of the temporary file a merge writes into
    pub fn merge_path(&self) -> PathBuf {
        let mut name = self.path.clone().into_os_string();
        name.push(".merge");
        PathBuf::from(name)
    }

    /// Reject configurations the engine cannot open
    pub fn validate(&self) -> Result<()> {
        if self.path.as_os_str().is_empty() {
            return Err(CaskError::Config("log path is empty".to_string()));
        }
        if self.path.is_dir() {
            return Err(CaskError::Config(format!(
                "log path {} is a directory",
                self.path.display()
            )));
        }
        Ok(())
    }
}

/// Builder for Config
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Set the log file path
    pub fn path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.path = path.into();
        self
    }

    /// Create missing parent directories on open
    pub fn create_dirs(mut self, create: bool) -> Self {
        self.config.create_dirs = create;
        self
    }

    /// Set the merge timestamp policy
    pub fn merge_timestamps(mut self, policy: MergeTimestamps) -> Self {
        self.config.merge_timestamps = policy;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}
