//! Directory walker implementation using walkdir.
//!
//! # Overview
//!
//! The [`Walker`] yields every regular file under a root that survives the
//! configured filters. Directory entries are sorted by file name so two walks
//! of the same tree always yield files in the same order.
//!
//! # Features
//!
//! - Extension denylist (cache files, reports, scripts)
//! - File name regex denylist
//! - Size filtering (min/max)
//! - Hidden file filtering
//! - Directory exclusion (report output directory)
//!
//! # Example
//!
//! ```no_run
//! use imgtriage::scanner::{Walker, WalkerConfig};
//! use std::path::Path;
//!
//! let walker = Walker::new(Path::new("/photos"), WalkerConfig::default());
//! let files: Vec<_> = walker.walk().filter_map(Result::ok).collect();
//! println!("Found {} files", files.len());
//! ```

use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use super::{ScanError, SourceFile, WalkerConfig};

/// Directory walker for file discovery.
#[derive(Debug)]
pub struct Walker {
    /// Root path to walk
    root: PathBuf,
    /// Walker configuration
    config: WalkerConfig,
}

impl Walker {
    /// Create a new walker for the given path.
    ///
    /// # Arguments
    ///
    /// * `path` - Root directory to scan
    /// * `config` - Walker configuration options
    #[must_use]
    pub fn new(path: &Path, config: WalkerConfig) -> Self {
        Self {
            root: path.to_path_buf(),
            config,
        }
    }

    /// Root directory of this walker.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Check if a file passes size filters.
    fn passes_size_filter(&self, size: u64) -> bool {
        if let Some(min) = self.config.min_size {
            if size < min {
                return false;
            }
        }
        if let Some(max) = self.config.max_size {
            if size > max {
                return false;
            }
        }
        true
    }

    /// Check the extension and file name denylists.
    ///
    /// The extension is whatever follows the last dot, so `.DS_Store` has the
    /// extension `DS_Store`.
    fn is_skipped_name(&self, path: &Path) -> bool {
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy())
            .unwrap_or_default();
        if let Some((_, extension)) = filename.rsplit_once('.') {
            if self
                .config
                .skip_extensions
                .iter()
                .any(|skip| skip.eq_ignore_ascii_case(extension))
            {
                return true;
            }
        }
        self.config
            .skip_patterns
            .iter()
            .any(|re| re.is_match(&filename))
    }

    fn is_hidden(path: &Path) -> bool {
        path.file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.starts_with('.'))
    }

    /// Walk the directory tree, yielding source files.
    ///
    /// Errors are yielded as [`ScanError`] values rather than stopping
    /// iteration. The sequence is lazy and can be restarted by calling
    /// `walk` again.
    pub fn walk(&self) -> impl Iterator<Item = Result<SourceFile, ScanError>> + '_ {
        let root = self.root.clone();
        WalkDir::new(&self.root)
            .follow_links(self.config.follow_symlinks)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(move |entry| {
                let path = entry.path();
                if path == root {
                    return true;
                }
                if self.config.skip_hidden && Self::is_hidden(path) {
                    log::trace!("Skipping hidden entry: {}", path.display());
                    return false;
                }
                if entry.file_type().is_dir()
                    && self.config.skip_dirs.iter().any(|d| d == path)
                {
                    log::trace!("Skipping excluded directory: {}", path.display());
                    return false;
                }
                true
            })
            .filter_map(move |entry_result| match entry_result {
                Ok(entry) => {
                    if !entry.file_type().is_file() {
                        return None;
                    }
                    let path = entry.path().to_path_buf();
                    if self.is_skipped_name(&path) {
                        log::trace!("Skipping by name: {}", path.display());
                        return None;
                    }
                    let metadata = match entry.metadata() {
                        Ok(m) => m,
                        Err(e) => {
                            return Some(Err(walk_error(path, e)));
                        }
                    };
                    if !metadata.is_file() {
                        return None;
                    }
                    let size = metadata.len();
                    if !self.passes_size_filter(size) {
                        log::trace!(
                            "Skipping file due to size filter ({}): {}",
                            size,
                            path.display()
                        );
                        return None;
                    }
                    Some(Ok(SourceFile::new(path, size)))
                }
                Err(e) => {
                    let path = e
                        .path()
                        .map_or_else(|| self.root.clone(), Path::to_path_buf);
                    Some(Err(walk_error(path, e)))
                }
            })
    }
}

/// Convert a walkdir error into a [`ScanError`].
fn walk_error(path: PathBuf, err: walkdir::Error) -> ScanError {
    let source = match err.into_io_error() {
        Some(io) => io,
        None => std::io::Error::other("filesystem loop detected"),
    };
    match source.kind() {
        std::io::ErrorKind::PermissionDenied => {
            log::warn!("Permission denied: {}", path.display());
            ScanError::PermissionDenied(path)
        }
        std::io::ErrorKind::NotFound => ScanError::NotFound(path),
        _ => ScanError::Io { path, source },
    }
}
