//! Cache entry definitions.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::scorers::ScoreResult;

/// Everything remembered about one file, addressed by its identity key.
///
/// A missing scorer in `results` means the scorer never ran on the file (or
/// failed and must be retried). A present scorer mapped to `None` means the
/// file was attempted and cannot be scored.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    /// Image width, `null` for non-images
    #[serde(default)]
    pub width: Option<u32>,
    /// Image height, `null` for non-images
    #[serde(default)]
    pub height: Option<u32>,
    /// Result per scorer id
    #[serde(default)]
    pub results: BTreeMap<String, Option<ScoreResult>>,
}

impl CacheEntry {
    /// Create an entry without results.
    #[must_use]
    pub fn new(dimensions: Option<(u32, u32)>) -> Self {
        Self {
            width: dimensions.map(|(w, _)| w),
            height: dimensions.map(|(_, h)| h),
            results: BTreeMap::new(),
        }
    }

    /// Dimensions as a pair when both are known.
    #[must_use]
    pub fn dimensions(&self) -> Option<(u32, u32)> {
        self.width.zip(self.height)
    }

    /// Cached outcome of a scorer. The outer `None` is a cache miss.
    #[must_use]
    pub fn result(&self, scorer: &str) -> Option<Option<&ScoreResult>> {
        self.results.get(scorer).map(Option::as_ref)
    }

    /// Fold a newer entry for the same file into this one.
    ///
    /// Results of scorers absent from `newer` are kept.
    pub fn merge(&mut self, newer: CacheEntry) {
        self.width = newer.width;
        self.height = newer.height;
        self.results.extend(newer.results);
    }
}
