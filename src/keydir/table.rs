//! KeyDir implementation
//!
//! HashMap-based index with RwLock for concurrency.

use std::collections::HashMap;

use parking_lot::RwLock;

use super::KeyDirEntry;

/// Maps each live key to where its newest value lives
pub struct KeyDir {
    entries: RwLock<HashMap<Vec<u8>, KeyDirEntry>>,
}

impl KeyDir {
    /// Create a new empty KeyDir
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Insert or replace the entry for `key` (write lock).
    ///
    /// No timestamp comparison happens here: callers feed entries in log
    /// order, so the last write in the file is the last write in the map.
    pub fn put(&self, key: Vec<u8>, entry: KeyDirEntry) -> Option<KeyDirEntry> {
        self.entries.write().insert(key, entry)
    }

    /// Look up a key (read lock)
    pub fn get(&self, key: &[u8]) -> Option<KeyDirEntry> {
        self.entries.read().get(key).copied()
    }

    /// Remove a key; removing an absent key is not an error
    pub fn delete(&self, key: &[u8]) -> Option<KeyDirEntry> {
        self.entries.write().remove(key)
    }

    pub fn contains_key(&self, key: &[u8]) -> bool {
        self.entries.read().contains_key(key)
    }

    /// Number of live keys
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Copy out every live `(key, entry)` pair.
    ///
    /// The lock is held only for the copy; the returned vector is
    /// independent of later mutations.
    pub fn snapshot(&self) -> Vec<(Vec<u8>, KeyDirEntry)> {
        self.entries
            .read()
            .iter()
            .map(|(key, entry)| (key.clone(), *entry))
            .collect()
    }

    /// Point keys at their merged locations in one write-locked pass.
    ///
    /// Each update is `(key, snapshot entry, new entry)`; a key whose entry
    /// changed since the snapshot is left alone. Returns how many entries
    /// were moved.
    pub fn retarget(&self, updates: Vec<(Vec<u8>, KeyDirEntry, KeyDirEntry)>) -> usize {
        let mut entries = self.entries.write();
        let mut moved = 0;
        for (key, old, new) in updates {
            if let Some(current) = entries.get_mut(&key) {
                if *current == old {
                    *current = new;
                    moved += 1;
                }
            }
        }
        moved
    }

    /// Drop every entry
    pub fn clear(&self) {
        self.entries.write().clear();
    }
}

impl Default for KeyDir {
    fn default() -> Self {
        Self::new()
    }
}
