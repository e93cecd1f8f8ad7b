//! Grouping and ranking of scored files.
//!
//! # Overview
//!
//! Records are grouped by the key their scorer derives from its result, and
//! each group is ordered by the scorer's ranking key with a stable sort:
//!
//! - Duplicate scorers drop singleton groups. The first member of a group is
//!   its reference member (largest resolution, then largest file). Groups
//!   are ordered by the reference member's path, then by key.
//! - Bucket scorers keep every record and order buckets by label.
//!
//! # Example
//!
//! ```
//! use imgtriage::pipeline::{group_records, ScoredFile};
//! use imgtriage::record::FileRecord;
//! use imgtriage::scorers::{Blake3Scorer, ScoreResult};
//! use std::collections::BTreeMap;
//!
//! let file = |path: &str, dims| ScoredFile {
//!     record: FileRecord::new(format!("/r/{path}:10"), path.into(), 10, dims),
//!     results: BTreeMap::from([("blake3".to_string(), Some(ScoreResult::Key("h".into())))]),
//! };
//! let files = vec![file("small.jpg", Some((10, 10))), file("big.jpg", Some((20, 20)))];
//!
//! let groups = group_records(&Blake3Scorer, &files);
//! assert_eq!(groups.len(), 1);
//! assert_eq!(groups[0].members[0].display_path(), "big.jpg");
//! ```

use std::collections::BTreeMap;

use bytesize::ByteSize;

use super::runner::ScoredFile;
use crate::record::FileRecord;
use crate::scorers::{Scorer, ScorerKind, ScorerRegistry};

/// Records sharing one group key, best-ranked first.
#[derive(Debug, Clone, PartialEq)]
pub struct Group {
    /// Group key: a hash value or a bucket label
    pub key: String,
    /// Ranked members
    pub members: Vec<FileRecord>,
}

impl Group {
    /// The first-ranked member; never relocated.
    #[must_use]
    pub fn reference(&self) -> Option<&FileRecord> {
        self.members.first()
    }

    /// Number of members.
    #[must_use]
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// Whether the group has no members.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Total size of all members.
    #[must_use]
    pub fn total_size(&self) -> u64 {
        self.members.iter().map(|m| m.size_bytes).sum()
    }

    /// Size of every member except the reference.
    #[must_use]
    pub fn wasted_space(&self) -> u64 {
        self.members.iter().skip(1).map(|m| m.size_bytes).sum()
    }
}

/// Every group produced by one scorer.
#[derive(Debug, Clone, PartialEq)]
pub struct ScorerGroups {
    /// Scorer identifier
    pub scorer: String,
    /// Presentation kind of the groups
    pub kind: ScorerKind,
    /// Ordered groups
    pub groups: Vec<Group>,
}

impl ScorerGroups {
    /// Number of records across all groups.
    #[must_use]
    pub fn record_count(&self) -> usize {
        self.groups.iter().map(Group::len).sum()
    }

    /// Space held by non-reference members of duplicate groups.
    #[must_use]
    pub fn reclaimable_display(&self) -> String {
        let bytes = match self.kind {
            ScorerKind::Duplicates => self.groups.iter().map(Group::wasted_space).sum(),
            ScorerKind::Buckets => 0,
        };
        ByteSize::b(bytes).to_string()
    }
}

/// Group and rank the files scored by one scorer.
#[must_use]
pub fn group_records(scorer: &dyn Scorer, files: &[ScoredFile]) -> Vec<Group> {
    let mut by_key: BTreeMap<String, Vec<FileRecord>> = BTreeMap::new();
    for file in files {
        let Some(result) = file.result(scorer.id()) else {
            continue;
        };
        let Some(key) = scorer.group_key(&file.record, result) else {
            continue;
        };
        let record = scorer.annotate(file.record.clone(), result);
        by_key.entry(key).or_default().push(record);
    }

    let mut groups: Vec<Group> = by_key
        .into_iter()
        .map(|(key, mut members)| {
            members.sort_by_cached_key(|r| scorer.ranking_key(r));
            Group { key, members }
        })
        .collect();

    if scorer.kind() == ScorerKind::Duplicates {
        groups.retain(|g| g.len() >= 2);
        groups.sort_by(|a, b| {
            let path = |g: &Group| g.reference().map(|r| r.relative_path.clone());
            path(a).cmp(&path(b)).then_with(|| a.key.cmp(&b.key))
        });
    }
    groups
}

/// Group the files for every scorer of a registry, in registration order.
#[must_use]
pub fn group_all(registry: &ScorerRegistry, files: &[ScoredFile]) -> Vec<ScorerGroups> {
    registry
        .iter()
        .map(|scorer| {
            let groups = group_records(scorer, files);
            log::debug!("{}: {} groups", scorer.id(), groups.len());
            ScorerGroups {
                scorer: scorer.id().to_string(),
                kind: scorer.kind(),
                groups,
            }
        })
        .collect()
}
