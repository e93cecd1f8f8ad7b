//! JSON-backed result cache.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use super::entry::CacheEntry;
use crate::scanner::normalize_path;

/// Errors that can occur while persisting the cache.
#[derive(thiserror::Error, Debug)]
pub enum CacheError {
    /// The cache file could not be written.
    #[error("Failed to write cache {path}: {source}")]
    Io {
        /// Cache file path
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// The cache could not be serialized.
    #[error("Failed to serialize cache: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Whether the current run saw every file the cache covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalkMode {
    /// The walk covered the whole cache root; unseen keys are dropped.
    Full,
    /// The walk covered only part of the cache root; unseen keys are kept.
    Partial,
}

impl WalkMode {
    /// Decide the mode for a walk.
    ///
    /// A walk is full when it started at or above the directory holding the
    /// cache and was not cut short. `..` components are resolved before the
    /// paths are compared.
    #[must_use]
    pub fn for_walk(cache_root: &Path, walk_root: &Path, truncated: bool) -> Self {
        if !truncated && normalize_path(cache_root).starts_with(normalize_path(walk_root)) {
            Self::Full
        } else {
            Self::Partial
        }
    }
}

/// Persisted mapping from identity key to cached results.
///
/// Read once at the start of a run, written once at the end.
#[derive(Debug)]
pub struct CacheStore {
    path: PathBuf,
    entries: BTreeMap<String, CacheEntry>,
}

impl CacheStore {
    /// Load the cache at `path`.
    ///
    /// A missing file is a cold start. An unreadable or corrupt file is
    /// logged and also treated as a cold start.
    #[must_use]
    pub fn load(path: &Path) -> Self {
        let entries = match std::fs::read_to_string(path) {
            Ok(content) => match serde_json::from_str(&content) {
                Ok(entries) => entries,
                Err(e) => {
                    log::warn!(
                        "Ignoring corrupt cache {}: {}; starting cold",
                        path.display(),
                        e
                    );
                    BTreeMap::new()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                log::debug!("No cache at {}; starting cold", path.display());
                BTreeMap::new()
            }
            Err(e) => {
                log::warn!(
                    "Cannot read cache {}: {}; starting cold",
                    path.display(),
                    e
                );
                BTreeMap::new()
            }
        };
        log::debug!("Loaded {} cache entries", entries.len());
        Self {
            path: path.to_path_buf(),
            entries,
        }
    }

    /// Path of the cache file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Look up the entry for an identity key.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&CacheEntry> {
        self.entries.get(key)
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the cache has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Fold this run's entries into the cache and overwrite the cache file.
    ///
    /// Revisited entries keep every previously cached result and gain the
    /// new ones. In [`WalkMode::Full`] keys missing from `new_entries` are
    /// dropped; in [`WalkMode::Partial`] they are carried forward.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written. The in-memory cache
    /// is updated either way.
    pub fn merge_and_save(
        &mut self,
        new_entries: BTreeMap<String, CacheEntry>,
        mode: WalkMode,
    ) -> Result<(), CacheError> {
        let mut previous = std::mem::take(&mut self.entries);
        let mut merged = BTreeMap::new();
        for (key, entry) in new_entries {
            let combined = match previous.remove(&key) {
                Some(mut old) => {
                    old.merge(entry);
                    old
                }
                None => entry,
            };
            merged.insert(key, combined);
        }
        match mode {
            WalkMode::Partial => merged.extend(previous),
            WalkMode::Full => {
                if !previous.is_empty() {
                    log::debug!("Dropping {} stale cache entries", previous.len());
                }
            }
        }
        self.entries = merged;
        self.save()
    }

    fn save(&self) -> Result<(), CacheError> {
        let io_err = |source| CacheError::Io {
            path: self.path.clone(),
            source,
        };
        let file = File::create(&self.path).map_err(io_err)?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, &self.entries)?;
        writer.write_all(b"\n").map_err(io_err)?;
        writer.flush().map_err(io_err)?;
        log::debug!(
            "Wrote {} cache entries to {}",
            self.entries.len(),
            self.path.display()
        );
        Ok(())
    }
}
