//! Writing report pages to disk.
//!
//! Every page has a stable name, so a rerun overwrites the previous run's
//! pages. Pages of the same scorer that a rerun no longer produces are
//! deleted.

use std::collections::{BTreeSet, HashMap};
use std::path::{Component, Path, PathBuf};

use super::html::{HtmlOutputError, RenderContext};
use super::pages::{paginate, PageLayout};
use crate::config::ReportConfig;
use crate::pipeline::ScorerGroups;
use crate::scorers::ScorerKind;

/// Errors that can occur while writing a report.
#[derive(thiserror::Error, Debug)]
pub enum ReportError {
    /// A page could not be rendered.
    #[error(transparent)]
    Render(#[from] HtmlOutputError),

    /// A page or directory could not be written.
    #[error("I/O error for {path}: {source}")]
    Io {
        /// Path where the error occurred
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
    },
}

/// Writes paginated reports into one directory.
#[derive(Debug, Clone)]
pub struct ReportWriter {
    dir: PathBuf,
    src_prefix: String,
    settings: ReportConfig,
}

impl ReportWriter {
    /// Create a writer for reports of the tree at `root`.
    ///
    /// Reports go to `root/settings.dir`, or to `root` itself.
    #[must_use]
    pub fn new(root: &Path, settings: ReportConfig) -> Self {
        let relative = settings.dir.clone().unwrap_or_default();
        let depth = relative
            .components()
            .filter(|c| matches!(c, Component::Normal(_)))
            .count();
        Self {
            dir: root.join(&relative),
            src_prefix: "../".repeat(depth),
            settings,
        }
    }

    /// Directory the pages are written to.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Write every page of one scorer's report and prune stale pages.
    ///
    /// Returns the written page paths in page order.
    ///
    /// # Errors
    ///
    /// Returns the first rendering or I/O error.
    pub fn write(&self, set: &ScorerGroups) -> Result<Vec<PathBuf>, ReportError> {
        std::fs::create_dir_all(&self.dir).map_err(|source| ReportError::Io {
            path: self.dir.clone(),
            source,
        })?;

        let items_per_row = match set.kind {
            ScorerKind::Duplicates => self.settings.duplicate_items_per_row,
            ScorerKind::Buckets => self.settings.bucket_items_per_row,
        };
        let layout = PageLayout::new(self.settings.rows_per_page, items_per_row);
        let pages = paginate(set, layout);
        let context = RenderContext {
            scorer: &set.scorer,
            kind: set.kind,
            prefix: &self.settings.prefix,
            src_prefix: self.src_prefix.clone(),
            cell_width: self.settings.cell_width,
        };

        let mut totals: HashMap<&str, usize> = HashMap::new();
        for page in &pages {
            *totals.entry(page.bucket.as_str()).or_default() += 1;
        }

        let mut written = Vec::with_capacity(pages.len());
        for page in &pages {
            let total = totals.get(page.bucket.as_str()).copied().unwrap_or(1);
            let html = context.page(page, total).to_html()?;
            let path = self.dir.join(page.file_name(&self.settings.prefix, &set.scorer));
            std::fs::write(&path, html).map_err(|source| ReportError::Io {
                path: path.clone(),
                source,
            })?;
            written.push(path);
        }

        self.prune(&set.scorer, &written);
        log::info!(
            "{}: {} groups, {} files on {} pages",
            set.scorer,
            set.groups.len(),
            set.record_count(),
            written.len()
        );
        Ok(written)
    }

    /// Delete pages of `scorer` that were not written in this run.
    fn prune(&self, scorer: &str, written: &[PathBuf]) {
        let keep: BTreeSet<&Path> = written.iter().map(PathBuf::as_path).collect();
        let stem = format!("{}-{}-", self.settings.prefix, scorer);
        let entries = match std::fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) => {
                log::warn!("Cannot list {}: {}", self.dir.display(), e);
                return;
            }
        };
        for entry in entries.flatten() {
            let path = entry.path();
            let name = entry.file_name();
            let name = name.to_string_lossy();
            let is_page = name
                .strip_prefix(&stem)
                .is_some_and(|rest| is_page_suffix(rest));
            if !is_page || keep.contains(path.as_path()) {
                continue;
            }
            match std::fs::remove_file(&path) {
                Ok(()) => log::debug!("Removed stale page {}", path.display()),
                Err(e) => log::warn!("Cannot remove stale page {}: {}", path.display(), e),
            }
        }
    }
}

/// `{bucket}-{number:04}.html` with a non-empty bucket.
fn is_page_suffix(rest: &str) -> bool {
    let Some(stem) = rest.strip_suffix(".html") else {
        return false;
    };
    match stem.rsplit_once('-') {
        Some((bucket, number)) => {
            !bucket.is_empty() && number.len() >= 4 && number.bytes().all(|b| b.is_ascii_digit())
        }
        None => false,
    }
}
