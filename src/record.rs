//! File records and ranking keys.
//!
//! A [`FileRecord`] is the immutable unit that flows from the pipeline into
//! grouping, relocation and reporting. Records are never mutated in place;
//! relocation builds a new record with [`FileRecord::with_path`].

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Serialize;

/// One source file as seen by grouping and reporting.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FileRecord {
    /// Cache address, `"{absolute_path}:{size_bytes}"`
    pub identity_key: String,
    /// Display path. Relative to the scan root unless the file was relocated,
    /// in which case it is the absolute destination path.
    pub relative_path: PathBuf,
    /// File size in bytes
    pub size_bytes: u64,
    /// Image width in pixels, if the file is a readable image
    pub width: Option<u32>,
    /// Image height in pixels, if the file is a readable image
    pub height: Option<u32>,
    /// Scorer-specific metrics (e.g. classifier probabilities)
    pub attributes: BTreeMap<String, f64>,
}

impl FileRecord {
    /// Create a record without attributes.
    #[must_use]
    pub fn new(
        identity_key: String,
        relative_path: PathBuf,
        size_bytes: u64,
        dimensions: Option<(u32, u32)>,
    ) -> Self {
        Self {
            identity_key,
            relative_path,
            size_bytes,
            width: dimensions.map(|(w, _)| w),
            height: dimensions.map(|(_, h)| h),
            attributes: BTreeMap::new(),
        }
    }

    /// A copy of this record pointing at a new location.
    #[must_use]
    pub fn with_path(&self, path: PathBuf) -> Self {
        Self {
            relative_path: path,
            ..self.clone()
        }
    }

    /// A copy of this record with additional attributes.
    #[must_use]
    pub fn with_attributes<I>(mut self, attributes: I) -> Self
    where
        I: IntoIterator<Item = (String, f64)>,
    {
        self.attributes.extend(attributes);
        self
    }

    /// Whether the record points outside the scan root after a move.
    #[must_use]
    pub fn is_relocated(&self) -> bool {
        self.relative_path.is_absolute()
    }

    /// Path with forward slashes, as used in reports.
    #[must_use]
    pub fn display_path(&self) -> String {
        display_path(&self.relative_path)
    }

    /// Dimensions as a pair when both are known.
    #[must_use]
    pub fn dimensions(&self) -> Option<(u32, u32)> {
        self.width.zip(self.height)
    }
}

/// Render a path with `/` separators regardless of platform.
#[must_use]
pub fn display_path(path: &Path) -> String {
    let text = path.to_string_lossy();
    if std::path::MAIN_SEPARATOR == '/' {
        text.into_owned()
    } else {
        text.replace(std::path::MAIN_SEPARATOR, "/")
    }
}

/// Orderable ranking key supplied by a scorer.
///
/// Lower keys come first in a group. The first member of a duplicate group
/// is its reference member.
#[derive(Debug, Clone)]
pub enum RankKey {
    /// Largest resolution first, then largest file, then path ascending.
    /// Records without dimensions rank after records with dimensions.
    Quality {
        /// Image width
        width: Option<u32>,
        /// Image height
        height: Option<u32>,
        /// File size in bytes
        size: u64,
        /// Display path, used as the final tie-break
        path: PathBuf,
    },
    /// Bucket label, then aggregate score, then size, all ascending.
    Severity {
        /// Severity bucket label
        bucket: String,
        /// Weighted aggregate score
        score: f64,
        /// File size in bytes
        size: u64,
    },
}

impl RankKey {
    /// The default duplicate-group ranking for a record.
    #[must_use]
    pub fn quality(record: &FileRecord) -> Self {
        Self::Quality {
            width: record.width,
            height: record.height,
            size: record.size_bytes,
            path: record.relative_path.clone(),
        }
    }
}

impl Ord for RankKey {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (
                Self::Quality {
                    width: w1,
                    height: h1,
                    size: s1,
                    path: p1,
                },
                Self::Quality {
                    width: w2,
                    height: h2,
                    size: s2,
                    path: p2,
                },
            ) => w2
                .cmp(w1)
                .then_with(|| h2.cmp(h1))
                .then_with(|| s2.cmp(s1))
                .then_with(|| p1.cmp(p2)),
            (
                Self::Severity {
                    bucket: b1,
                    score: sc1,
                    size: s1,
                },
                Self::Severity {
                    bucket: b2,
                    score: sc2,
                    size: s2,
                },
            ) => b1
                .cmp(b2)
                .then_with(|| sc1.total_cmp(sc2))
                .then_with(|| s1.cmp(s2)),
            (Self::Quality { .. }, Self::Severity { .. }) => Ordering::Less,
            (Self::Severity { .. }, Self::Quality { .. }) => Ordering::Greater,
        }
    }
}

impl PartialOrd for RankKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for RankKey {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for RankKey {}
