//! Moving files out of the scanned tree.
//!
//! # Overview
//!
//! This module provides:
//! - [`move_file`]: a single move that never overwrites
//! - [`relocate_duplicates`]: move every non-reference member of duplicate
//!   groups under a destination root, mirroring the relative layout
//! - [`relocate_tree`]: move a whole tree, preserving its structure
//!
//! # Safety
//!
//! Every move checks that the destination does not exist; if it does, both
//! files are left untouched. The reference member of a group is never moved.
//! A failed move only affects that file; batch operations log it and
//! continue.
//!
//! # Example
//!
//! ```no_run
//! use imgtriage::actions::relocate::move_file;
//! use std::path::Path;
//!
//! match move_file(Path::new("/photos/dup.jpg"), Path::new("/trash/dup.jpg")) {
//!     Ok(()) => println!("moved"),
//!     Err(e) => eprintln!("Failed: {}", e),
//! }
//! ```

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;
use walkdir::WalkDir;

use crate::pipeline::Group;

/// Errors that can occur while moving a file.
#[derive(Debug, Error)]
pub enum MoveError {
    /// The destination already exists; nothing was moved.
    #[error("destination already exists: {0}")]
    DestinationExists(PathBuf),

    /// The source does not exist.
    #[error("file not found: {0}")]
    NotFound(PathBuf),

    /// The source root of a tree move is not a directory.
    #[error("not a directory: {0}")]
    NotADirectory(PathBuf),

    /// The move itself failed.
    #[error("I/O error for {path}: {source}")]
    Io {
        /// Path where the error occurred
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: io::Error,
    },
}

impl MoveError {
    /// Path associated with this error.
    #[must_use]
    pub fn path(&self) -> &Path {
        match self {
            Self::DestinationExists(p) | Self::NotFound(p) | Self::NotADirectory(p) => p,
            Self::Io { path, .. } => path,
        }
    }
}

/// Outcome of a batch of moves.
#[derive(Debug, Clone, Default)]
pub struct BatchMoveResult {
    /// `(source, destination)` of every completed move
    pub moved: Vec<(PathBuf, PathBuf)>,
    /// Source and error message of every failed move
    pub failures: Vec<(PathBuf, String)>,
}

impl BatchMoveResult {
    /// Number of completed moves.
    #[must_use]
    pub fn success_count(&self) -> usize {
        self.moved.len()
    }

    /// Number of failed moves.
    #[must_use]
    pub fn failure_count(&self) -> usize {
        self.failures.len()
    }

    /// Whether every move succeeded.
    #[must_use]
    pub fn all_succeeded(&self) -> bool {
        self.failures.is_empty()
    }

    /// One-line summary for logs.
    #[must_use]
    pub fn summary(&self) -> String {
        if self.all_succeeded() {
            format!("Moved {} file(s)", self.success_count())
        } else {
            format!(
                "Moved {} file(s), {} failed",
                self.success_count(),
                self.failure_count()
            )
        }
    }

    pub(super) fn record(&mut self, src: &Path, dst: &Path, result: Result<(), MoveError>) -> bool {
        match result {
            Ok(()) => {
                log::debug!("Moved {} -> {}", src.display(), dst.display());
                self.moved.push((src.to_path_buf(), dst.to_path_buf()));
                true
            }
            Err(e) => {
                log::error!("Cannot move {}: {}", src.display(), e);
                self.failures.push((src.to_path_buf(), e.to_string()));
                false
            }
        }
    }
}

/// Move `src` to `dst`, creating parent directories as needed.
///
/// Falls back to copy and remove when a rename is not possible (e.g.
/// across filesystems).
///
/// # Errors
///
/// Returns [`MoveError::DestinationExists`] without touching either file if
/// `dst` exists, and an I/O error if the move fails.
pub fn move_file(src: &Path, dst: &Path) -> Result<(), MoveError> {
    if fs::symlink_metadata(dst).is_ok() {
        return Err(MoveError::DestinationExists(dst.to_path_buf()));
    }
    if fs::symlink_metadata(src).is_err() {
        return Err(MoveError::NotFound(src.to_path_buf()));
    }
    if let Some(parent) = dst.parent() {
        fs::create_dir_all(parent).map_err(|source| MoveError::Io {
            path: parent.to_path_buf(),
            source,
        })?;
    }

    if let Err(rename_err) = fs::rename(src, dst) {
        log::debug!(
            "Rename {} failed ({}), copying instead",
            src.display(),
            rename_err
        );
        if let Err(source) = fs::copy(src, dst) {
            let _ = fs::remove_file(dst);
            return Err(MoveError::Io {
                path: src.to_path_buf(),
                source,
            });
        }
        fs::remove_file(src).map_err(|source| MoveError::Io {
            path: src.to_path_buf(),
            source,
        })?;
    }
    Ok(())
}

/// Move every non-reference member of each group to
/// `dst_root/relative_path`.
///
/// Returns the groups with moved members pointing at their absolute
/// destination. Members that could not be moved, and members that were
/// already relocated, keep their path.
#[must_use]
pub fn relocate_duplicates(
    groups: &[Group],
    root: &Path,
    dst_root: &Path,
) -> (Vec<Group>, BatchMoveResult) {
    let mut result = BatchMoveResult::default();
    let updated = groups
        .iter()
        .map(|group| {
            let members = group
                .members
                .iter()
                .enumerate()
                .map(|(i, record)| {
                    if i == 0 || record.is_relocated() {
                        return record.clone();
                    }
                    let src = root.join(&record.relative_path);
                    let dst = dst_root.join(&record.relative_path);
                    if result.record(&src, &dst, move_file(&src, &dst)) {
                        record.with_path(dst)
                    } else {
                        record.clone()
                    }
                })
                .collect();
            Group {
                key: group.key.clone(),
                members,
            }
        })
        .collect();
    log::info!("{}", result.summary());
    (updated, result)
}

/// Move every file under `src_root` to the same relative path under
/// `dst_root`.
///
/// # Errors
///
/// Returns an error only if `src_root` is not a directory. Per-file
/// failures are collected in the result.
pub fn relocate_tree(src_root: &Path, dst_root: &Path) -> Result<BatchMoveResult, MoveError> {
    if !src_root.is_dir() {
        return Err(MoveError::NotADirectory(src_root.to_path_buf()));
    }

    let mut result = BatchMoveResult::default();
    // Collect first so moves do not disturb the walk.
    let mut files = Vec::new();
    for entry in WalkDir::new(src_root).sort_by_file_name() {
        match entry {
            Ok(entry) if entry.file_type().is_file() => files.push(entry.into_path()),
            Ok(_) => {}
            Err(e) => {
                let path = e.path().unwrap_or(src_root).to_path_buf();
                log::warn!("Skipping {}: {}", path.display(), e);
                result.failures.push((path, e.to_string()));
            }
        }
    }

    for src in files {
        let Ok(relative) = src.strip_prefix(src_root) else {
            continue;
        };
        let dst = dst_root.join(relative);
        result.record(&src, &dst, move_file(&src, &dst));
    }
    log::info!("{}", result.summary());
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::FileRecord;
    use tempfile::tempdir;

    #[test]
    fn test_move_creates_parents() {
        let dir = tempdir().unwrap();
        let src = dir.path().join("a.jpg");
        let dst = dir.path().join("out").join("deep").join("a.jpg");
        fs::write(&src, b"a").unwrap();

        move_file(&src, &dst).unwrap();
        assert!(!src.exists());
        assert_eq!(fs::read(&dst).unwrap(), b"a");
    }

    #[test]
    fn test_move_refuses_existing_destination() {
        let dir = tempdir().unwrap();
        let src = dir.path().join("a.jpg");
        let dst = dir.path().join("b.jpg");
        fs::write(&src, b"source").unwrap();
        fs::write(&dst, b"destination").unwrap();

        let err = move_file(&src, &dst).unwrap_err();
        assert!(matches!(err, MoveError::DestinationExists(_)));
        assert_eq!(err.path(), dst.as_path());
        assert_eq!(fs::read(&src).unwrap(), b"source");
        assert_eq!(fs::read(&dst).unwrap(), b"destination");
    }

    #[test]
    fn test_move_missing_source() {
        let dir = tempdir().unwrap();
        let err = move_file(&dir.path().join("nope"), &dir.path().join("x")).unwrap_err();
        assert!(matches!(err, MoveError::NotFound(_)));
    }

    #[test]
    fn test_relocate_duplicates_keeps_reference() {
        let root = tempdir().unwrap();
        let trash = tempdir().unwrap();
        fs::create_dir(root.path().join("sub")).unwrap();
        for name in ["best.jpg", "sub/copy.jpg", "taken.jpg"] {
            fs::write(root.path().join(name), name).unwrap();
        }
        // A file already at the destination blocks the third move.
        fs::write(trash.path().join("taken.jpg"), b"occupied").unwrap();

        let record = |p: &str| FileRecord::new(format!("{p}:1"), p.into(), 1, Some((1, 1)));
        let groups = vec![Group {
            key: "h".into(),
            members: vec![record("best.jpg"), record("sub/copy.jpg"), record("taken.jpg")],
        }];

        let (updated, result) = relocate_duplicates(&groups, root.path(), trash.path());
        assert_eq!(result.success_count(), 1);
        assert_eq!(result.failure_count(), 1);

        let members = &updated[0].members;
        assert_eq!(members[0].relative_path, PathBuf::from("best.jpg"));
        assert!(root.path().join("best.jpg").exists());
        assert_eq!(members[1].relative_path, trash.path().join("sub/copy.jpg"));
        assert!(members[1].is_relocated());
        assert!(trash.path().join("sub/copy.jpg").exists());
        assert_eq!(members[2].relative_path, PathBuf::from("taken.jpg"));
        assert!(root.path().join("taken.jpg").exists());
    }

    #[test]
    fn test_relocate_tree_preserves_structure() {
        let src = tempdir().unwrap();
        let dst = tempdir().unwrap();
        fs::create_dir_all(src.path().join("a/b")).unwrap();
        fs::write(src.path().join("top.jpg"), b"1").unwrap();
        fs::write(src.path().join("a/b/deep.jpg"), b"2").unwrap();

        let result = relocate_tree(src.path(), dst.path()).unwrap();
        assert_eq!(result.success_count(), 2);
        assert!(dst.path().join("top.jpg").exists());
        assert!(dst.path().join("a/b/deep.jpg").exists());
        assert!(!src.path().join("a/b/deep.jpg").exists());
    }

    #[test]
    fn test_relocate_tree_requires_directory() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("f");
        fs::write(&file, b"x").unwrap();
        assert!(matches!(
            relocate_tree(&file, dir.path()),
            Err(MoveError::NotADirectory(_))
        ));
    }
}
