//! File actions.
//!
//! The [`relocate`] module moves files out of the scanned tree:
//! - Duplicate members are moved under a destination root, mirroring their
//!   relative layout, while each group's reference member stays in place
//! - Whole trees can be moved while keeping their structure
//! - A move never overwrites an existing file
//!
//! The [`cleanup`] module moves tiny files, files with unwanted names and
//! non-images out of a tree.
//!
//! ```no_run
//! use imgtriage::actions::relocate_tree;
//! use std::path::Path;
//!
//! let result = relocate_tree(Path::new("/photos/dups"), Path::new("/archive/dups"));
//! ```

pub mod cleanup;
pub mod relocate;

pub use cleanup::{cleanup_tree, CleanupOptions, CleanupReason, CleanupResult};
pub use relocate::{move_file, relocate_duplicates, relocate_tree, BatchMoveResult, MoveError};
