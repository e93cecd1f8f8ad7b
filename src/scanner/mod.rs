//! Scanner module for directory traversal and lazy file access.
//!
//! This module provides functionality for:
//! - Sorted, filtered directory walking using walkdir
//! - Lazy, memoized access to a file's bytes, decoded luminance and dimensions
//! - Cache identity keys derived from path and size
//!
//! # Architecture
//!
//! - [`walker`]: Directory traversal and file discovery
//!
//! # Example
//!
//! ```no_run
//! use imgtriage::scanner::{Walker, WalkerConfig};
//! use std::path::Path;
//!
//! let config = WalkerConfig {
//!     max_size: Some(50 * 1024 * 1024),
//!     ..Default::default()
//! };
//!
//! let walker = Walker::new(Path::new("/photos"), config);
//! for entry in walker.walk() {
//!     match entry {
//!         Ok(file) => println!("{}: {} bytes", file.path.display(), file.size),
//!         Err(e) => eprintln!("Warning: {}", e),
//!     }
//! }
//! ```

pub mod walker;

use std::cell::OnceCell;
use std::io::Cursor;
use std::path::{Component, Path, PathBuf};

use image::{GrayImage, ImageReader};
use regex::Regex;

pub use walker::Walker;

/// A discovered file whose contents are loaded on first use.
///
/// Several scorers usually need the same bytes or the same decoded image,
/// so both are read at most once per file.
#[derive(Debug)]
pub struct SourceFile {
    /// Absolute path to the file
    pub path: PathBuf,
    /// File size in bytes
    pub size: u64,
    bytes: OnceCell<Result<Vec<u8>, String>>,
    luma: OnceCell<Option<GrayImage>>,
}

impl SourceFile {
    /// Create a new SourceFile.
    ///
    /// # Arguments
    ///
    /// * `path` - Absolute path to the file
    /// * `size` - File size in bytes
    #[must_use]
    pub fn new(path: PathBuf, size: u64) -> Self {
        Self {
            path,
            size,
            bytes: OnceCell::new(),
            luma: OnceCell::new(),
        }
    }

    /// Cache address of this file: `"{absolute_path}:{size_bytes}"`.
    ///
    /// The size is part of the key so a replaced file of a different size
    /// never picks up the stale results of its predecessor.
    #[must_use]
    pub fn identity_key(&self) -> String {
        identity_key(&self.path, self.size)
    }

    /// Raw file contents, read on first call.
    pub fn bytes(&self) -> Result<&[u8], ScanError> {
        self.bytes
            .get_or_init(|| std::fs::read(&self.path).map_err(|e| e.to_string()))
            .as_deref()
            .map_err(|message| ScanError::Read {
                path: self.path.clone(),
                message: message.clone(),
            })
    }

    /// 8-bit luminance image, decoded on first call.
    ///
    /// Returns `Ok(None)` when the bytes are not a decodable image.
    pub fn luma(&self) -> Result<Option<&GrayImage>, ScanError> {
        let bytes = self.bytes()?;
        Ok(self
            .luma
            .get_or_init(|| match image::load_from_memory(bytes) {
                Ok(img) => Some(img.to_luma8()),
                Err(e) => {
                    log::debug!("Not a decodable image {}: {}", self.path.display(), e);
                    None
                }
            })
            .as_ref())
    }

    /// Image dimensions read from the file header.
    ///
    /// Returns `Ok(None)` when the format is unknown or the header is invalid.
    pub fn dimensions(&self) -> Result<Option<(u32, u32)>, ScanError> {
        let bytes = self.bytes()?;
        let dims = ImageReader::new(Cursor::new(bytes))
            .with_guessed_format()
            .ok()
            .and_then(|reader| reader.into_dimensions().ok());
        Ok(dims)
    }
}

/// Build the cache identity key for a path and size.
#[must_use]
pub fn identity_key(path: &Path, size: u64) -> String {
    format!("{}:{}", path.display(), size)
}

/// Resolve `.` and `..` components without touching the file system.
#[must_use]
pub fn normalize_path(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push(component);
                }
            }
            other => out.push(other),
        }
    }
    out
}

/// Configuration for directory walking.
///
/// Controls filtering, symlink handling, and other walk behavior.
#[derive(Debug, Clone, Default)]
pub struct WalkerConfig {
    /// Follow symbolic links during traversal.
    pub follow_symlinks: bool,

    /// Skip hidden files and directories (names starting with `.`).
    pub skip_hidden: bool,

    /// Minimum file size to include (in bytes).
    pub min_size: Option<u64>,

    /// Maximum file size to include (in bytes).
    pub max_size: Option<u64>,

    /// Lowercase file extensions (without the dot) that are never yielded.
    pub skip_extensions: Vec<String>,

    /// File name patterns that are never yielded.
    pub skip_patterns: Vec<Regex>,

    /// Directories whose contents are never yielded (e.g. the report directory).
    pub skip_dirs: Vec<PathBuf>,
}

/// Errors that can occur during directory scanning and file access.
#[derive(thiserror::Error, Debug)]
pub enum ScanError {
    /// Permission was denied when accessing a file or directory.
    #[error("Permission denied: {0}")]
    PermissionDenied(PathBuf),

    /// The specified path was not found.
    #[error("Path not found: {0}")]
    NotFound(PathBuf),

    /// The specified path is not a directory.
    #[error("Not a directory: {0}")]
    NotADirectory(PathBuf),

    /// An I/O error occurred while walking.
    #[error("I/O error for {path}: {source}")]
    Io {
        /// Path where the error occurred
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// The file contents could not be read.
    #[error("Failed to read {path}: {message}")]
    Read {
        /// Path of the unreadable file
        path: PathBuf,
        /// Description of the underlying I/O error
        message: String,
    },
}

impl ScanError {
    /// Path associated with this error.
    #[must_use]
    pub fn path(&self) -> &std::path::Path {
        match self {
            Self::PermissionDenied(p) | Self::NotFound(p) | Self::NotADirectory(p) => p,
            Self::Io { path, .. } | Self::Read { path, .. } => path,
        }
    }
}
