//! Moving junk out of a tree before it is triaged.
//!
//! A file is moved when the first of these checks applies:
//!
//! 1. it is smaller than the size threshold,
//! 2. its file name matches one of the patterns,
//! 3. its header does not describe an image.
//!
//! Files are moved with [`move_file`], so nothing is ever overwritten.

use std::fmt;
use std::path::{Path, PathBuf};

use regex::Regex;

use super::relocate::{move_file, BatchMoveResult, MoveError};
use crate::scanner::{normalize_path, ScanError, SourceFile, Walker, WalkerConfig};

/// Files below this size (20 KiB) are moved.
pub const DEFAULT_SIZE_THRESHOLD: u64 = 20 * 1024;

/// Length of the hex suffix given to flattened file names.
const SUFFIX_LEN: usize = 16;

/// Why a file was moved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum CleanupReason {
    /// Smaller than the size threshold
    TooSmall,
    /// File name matched a pattern
    NameMatch,
    /// Not readable as an image
    NotAnImage,
}

impl fmt::Display for CleanupReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::TooSmall => "too small",
            Self::NameMatch => "name matches a pattern",
            Self::NotAnImage => "not an image",
        })
    }
}

/// Settings of one cleanup run.
#[derive(Debug, Clone)]
pub struct CleanupOptions {
    /// Files strictly smaller than this many bytes are moved
    pub size_threshold: u64,
    /// File name patterns; a match anywhere in the name moves the file
    pub patterns: Vec<Regex>,
    /// Mirror the source layout under the destination. Otherwise every file
    /// lands directly in the destination with a suffix derived from its path.
    pub keep_structure: bool,
    /// Which files are considered at all
    pub walker: WalkerConfig,
}

impl Default for CleanupOptions {
    fn default() -> Self {
        Self {
            size_threshold: DEFAULT_SIZE_THRESHOLD,
            patterns: Vec::new(),
            keep_structure: true,
            walker: WalkerConfig::default(),
        }
    }
}

/// Outcome of a cleanup run.
#[derive(Debug, Clone, Default)]
pub struct CleanupResult {
    /// Completed and failed moves
    pub moves: BatchMoveResult,
    /// Reason of every completed move, in move order
    pub reasons: Vec<CleanupReason>,
}

impl CleanupResult {
    /// Number of completed moves for `reason`.
    #[must_use]
    pub fn count(&self, reason: CleanupReason) -> usize {
        self.reasons.iter().filter(|r| **r == reason).count()
    }
}

/// Decide whether `file` should be moved.
///
/// # Errors
///
/// Returns an error if the file has to be read and cannot be.
pub fn cleanup_reason(
    file: &SourceFile,
    options: &CleanupOptions,
) -> Result<Option<CleanupReason>, ScanError> {
    if file.size < options.size_threshold {
        return Ok(Some(CleanupReason::TooSmall));
    }
    let name = file
        .path
        .file_name()
        .map(|n| n.to_string_lossy())
        .unwrap_or_default();
    if options.patterns.iter().any(|re| re.is_match(&name)) {
        return Ok(Some(CleanupReason::NameMatch));
    }
    if file.dimensions()?.is_none() {
        return Ok(Some(CleanupReason::NotAnImage));
    }
    Ok(None)
}

/// Destination of `src` in flattened mode: `{stem}.{suffix}.{ext}`.
///
/// The suffix is a prefix of the BLAKE3 hash of the source path, so files
/// with the same name from different directories do not collide.
fn flat_destination(src: &Path, dst_root: &Path) -> PathBuf {
    let hash = blake3::hash(src.as_os_str().as_encoded_bytes()).to_hex();
    let suffix = &hash.as_str()[..SUFFIX_LEN];
    let stem = src
        .file_stem()
        .map(|s| s.to_string_lossy())
        .unwrap_or_default();
    let name = match src.extension() {
        Some(ext) => format!("{stem}.{suffix}.{}", ext.to_string_lossy()),
        None => format!("{stem}.{suffix}"),
    };
    dst_root.join(name)
}

/// Move every junk file under `src_root` to `dst_root`.
///
/// The destination is excluded from the walk when it lies inside the
/// source. Files are collected before anything moves.
///
/// # Errors
///
/// Returns an error only if `src_root` is not a directory. Unreadable
/// files and failed moves are collected in the result.
pub fn cleanup_tree(
    src_root: &Path,
    dst_root: &Path,
    options: &CleanupOptions,
) -> Result<CleanupResult, MoveError> {
    if !src_root.is_dir() {
        return Err(MoveError::NotADirectory(src_root.to_path_buf()));
    }
    let mut walker_config = options.walker.clone();
    walker_config.skip_dirs.push(normalize_path(dst_root));
    let walker = Walker::new(&normalize_path(src_root), walker_config);

    let mut result = CleanupResult::default();
    let files: Vec<SourceFile> = walker
        .walk()
        .filter_map(|entry| match entry {
            Ok(file) => Some(file),
            Err(e) => {
                log::warn!("Skipping {}: {}", e.path().display(), e);
                result
                    .moves
                    .failures
                    .push((e.path().to_path_buf(), e.to_string()));
                None
            }
        })
        .collect();

    for file in files {
        let reason = match cleanup_reason(&file, options) {
            Ok(Some(reason)) => reason,
            Ok(None) => continue,
            Err(e) => {
                log::error!("Cannot check {}: {}", file.path.display(), e);
                result.moves.failures.push((file.path.clone(), e.to_string()));
                continue;
            }
        };
        let dst = if options.keep_structure {
            match file.path.strip_prefix(walker.root()) {
                Ok(relative) => dst_root.join(relative),
                Err(_) => continue,
            }
        } else {
            flat_destination(&file.path, dst_root)
        };
        log::debug!("{}: {}", file.path.display(), reason);
        if result.moves.record(&file.path, &dst, move_file(&file.path, &dst)) {
            result.reasons.push(reason);
        }
    }

    log::info!(
        "{} ({} too small, {} by name, {} not images)",
        result.moves.summary(),
        result.count(CleanupReason::TooSmall),
        result.count(CleanupReason::NameMatch),
        result.count(CleanupReason::NotAnImage)
    );
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, Luma};
    use std::fs;
    use tempfile::tempdir;

    fn options(threshold: u64, patterns: &[&str]) -> CleanupOptions {
        CleanupOptions {
            size_threshold: threshold,
            patterns: patterns.iter().map(|p| Regex::new(p).unwrap()).collect(),
            ..CleanupOptions::default()
        }
    }

    fn noisy_png(path: &Path, size: u32) {
        let img = GrayImage::from_fn(size, size, |x, y| {
            Luma([((x * 31 + y * 17) ^ (x * y)) as u8])
        });
        img.save(path).unwrap();
    }

    #[test]
    fn test_small_files_are_moved() {
        let src = tempdir().unwrap();
        let dst = tempdir().unwrap();
        noisy_png(&src.path().join("tiny.png"), 4);
        noisy_png(&src.path().join("big.png"), 64);
        let big = fs::metadata(src.path().join("big.png")).unwrap().len();

        let result = cleanup_tree(src.path(), dst.path(), &options(big, &[])).unwrap();
        assert_eq!(result.count(CleanupReason::TooSmall), 1);
        assert!(dst.path().join("tiny.png").exists());
        assert!(src.path().join("big.png").exists());
    }

    #[test]
    fn test_matching_names_are_moved() {
        let src = tempdir().unwrap();
        let dst = tempdir().unwrap();
        fs::create_dir(src.path().join("forum")).unwrap();
        noisy_png(&src.path().join("forum/u1_avatar_x.png"), 32);
        noisy_png(&src.path().join("forum/photo.png"), 32);

        let opts = options(0, &[r"_avatar_.*\.png$"]);
        let result = cleanup_tree(src.path(), dst.path(), &opts).unwrap();
        assert_eq!(result.reasons, vec![CleanupReason::NameMatch]);
        assert!(dst.path().join("forum/u1_avatar_x.png").exists());
        assert!(src.path().join("forum/photo.png").exists());
    }

    #[test]
    fn test_non_images_are_moved() {
        let src = tempdir().unwrap();
        let dst = tempdir().unwrap();
        fs::write(src.path().join("page.php"), b"<?php echo 1; ?>").unwrap();
        fs::write(src.path().join("broken.jpg"), b"not really a jpeg").unwrap();
        noisy_png(&src.path().join("ok.png"), 16);

        let result = cleanup_tree(src.path(), dst.path(), &options(0, &[])).unwrap();
        assert_eq!(result.count(CleanupReason::NotAnImage), 2);
        assert!(dst.path().join("page.php").exists());
        assert!(dst.path().join("broken.jpg").exists());
        assert!(src.path().join("ok.png").exists());
    }

    #[test]
    fn test_first_matching_check_wins() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("x_avatar_.txt");
        fs::write(&path, b"tiny").unwrap();
        let file = SourceFile::new(path, 4);

        let reason = cleanup_reason(&file, &options(10, &["avatar"])).unwrap();
        assert_eq!(reason, Some(CleanupReason::TooSmall));
        let reason = cleanup_reason(&file, &options(0, &["avatar"])).unwrap();
        assert_eq!(reason, Some(CleanupReason::NameMatch));
        let reason = cleanup_reason(&file, &options(0, &[])).unwrap();
        assert_eq!(reason, Some(CleanupReason::NotAnImage));
    }

    #[test]
    fn test_flattened_names_do_not_collide() {
        let src = tempdir().unwrap();
        let dst = tempdir().unwrap();
        for dir in ["a", "b"] {
            fs::create_dir(src.path().join(dir)).unwrap();
            fs::write(src.path().join(dir).join("f.gif"), b"gif?").unwrap();
        }
        fs::write(src.path().join("README"), b"no extension").unwrap();

        let opts = CleanupOptions {
            keep_structure: false,
            ..options(0, &[])
        };
        let result = cleanup_tree(src.path(), dst.path(), &opts).unwrap();
        assert!(result.moves.all_succeeded());
        assert_eq!(result.moves.success_count(), 3);

        let mut names: Vec<String> = fs::read_dir(dst.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        assert_eq!(names.len(), 3);
        assert!(names[0].starts_with("README.") && names[0].len() == "README.".len() + 16);
        assert!(names[1].starts_with("f.") && names[1].ends_with(".gif"));
        assert_ne!(names[1], names[2]);
    }

    #[test]
    fn test_destination_inside_source_is_not_walked() {
        let src = tempdir().unwrap();
        let dst = src.path().join("junk");
        fs::write(src.path().join("a.bin"), b"a").unwrap();

        let first = cleanup_tree(src.path(), &dst, &options(0, &[])).unwrap();
        assert_eq!(first.moves.success_count(), 1);
        let second = cleanup_tree(src.path(), &dst, &options(0, &[])).unwrap();
        assert_eq!(second.moves.success_count(), 0);
        assert!(dst.join("a.bin").exists());
        assert!(!dst.join("junk").exists());
    }

    #[test]
    fn test_missing_source_is_an_error() {
        let dir = tempdir().unwrap();
        let err = cleanup_tree(&dir.path().join("nope"), dir.path(), &options(0, &[]))
            .unwrap_err();
        assert!(matches!(err, MoveError::NotADirectory(_)));
    }
}
