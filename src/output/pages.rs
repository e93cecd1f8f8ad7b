//! Splitting ranked groups into bounded report pages.
//!
//! A page holds at most `rows_per_page` rows and a row at most
//! `items_per_row` members. A group larger than one row continues on the
//! next row under the same key, so no record is ever dropped. For bucket
//! reports every bucket starts on a fresh page.

use std::collections::HashMap;

use crate::pipeline::{Group, ScorerGroups};
use crate::record::FileRecord;
use crate::scorers::ScorerKind;

/// Bucket label used for duplicate reports, which are not bucketed.
pub const DUPLICATES_BUCKET: &str = "dups";

/// Page and row bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageLayout {
    /// Maximum rows per page
    pub rows_per_page: usize,
    /// Maximum members per row
    pub items_per_row: usize,
}

impl PageLayout {
    /// Create a layout; both bounds are raised to at least 1.
    #[must_use]
    pub fn new(rows_per_page: usize, items_per_row: usize) -> Self {
        Self {
            rows_per_page: rows_per_page.max(1),
            items_per_row: items_per_row.max(1),
        }
    }
}

/// One table row of a report page.
#[derive(Debug, Clone, PartialEq)]
pub struct Row<'a> {
    /// Group key shown in the first column
    pub key: &'a str,
    /// Whether this row continues the previous row's group
    pub continued: bool,
    /// Width of the group's reference member, used for scaling
    pub reference_width: Option<u32>,
    /// Members on this row, in rank order
    pub members: &'a [FileRecord],
}

/// One report page.
#[derive(Debug, Clone, PartialEq)]
pub struct Page<'a> {
    /// Bucket label of every row on the page
    pub bucket: String,
    /// 1-based page number within the bucket
    pub number: usize,
    /// Rows in display order
    pub rows: Vec<Row<'a>>,
}

impl Page<'_> {
    /// Number of records on the page.
    #[must_use]
    pub fn record_count(&self) -> usize {
        self.rows.iter().map(|r| r.members.len()).sum()
    }

    /// Stable file name of the page.
    #[must_use]
    pub fn file_name(&self, prefix: &str, scorer: &str) -> String {
        page_file_name(prefix, scorer, &self.bucket, self.number)
    }
}

/// `{prefix}-{scorer}-{bucket}-{number:04}.html`
#[must_use]
pub fn page_file_name(prefix: &str, scorer: &str, bucket: &str, number: usize) -> String {
    format!("{prefix}-{scorer}-{bucket}-{number:04}.html")
}

/// Bucket label of a group within a scorer's report.
fn bucket_of<'g>(kind: ScorerKind, group: &'g Group) -> &'g str {
    match kind {
        ScorerKind::Duplicates => DUPLICATES_BUCKET,
        ScorerKind::Buckets => &group.key,
    }
}

/// Split a scorer's groups into pages.
#[must_use]
pub fn paginate(set: &ScorerGroups, layout: PageLayout) -> Vec<Page<'_>> {
    let mut pages: Vec<Page<'_>> = Vec::new();
    let mut current: Option<Page<'_>> = None;
    let mut numbers: HashMap<&str, usize> = HashMap::new();

    for group in &set.groups {
        let bucket = bucket_of(set.kind, group);
        if current.as_ref().is_some_and(|p| p.bucket != bucket) {
            pages.extend(current.take());
        }

        let reference_width = group.reference().and_then(|r| r.width);
        for (i, members) in group.members.chunks(layout.items_per_row).enumerate() {
            if current
                .as_ref()
                .is_some_and(|p| p.rows.len() >= layout.rows_per_page)
            {
                pages.extend(current.take());
            }
            let page = current.get_or_insert_with(|| {
                let number = numbers.entry(bucket).or_default();
                *number += 1;
                Page {
                    bucket: bucket.to_string(),
                    number: *number,
                    rows: Vec::new(),
                }
            });
            page.rows.push(Row {
                key: &group.key,
                continued: i > 0,
                reference_width,
                members,
            });
        }
    }
    pages.extend(current);
    pages
}
