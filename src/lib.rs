//! imgtriage - Offline Image Triage
//!
//! Walks a directory tree, scores every file with pluggable scorers (exact
//! content hash, perceptual hash, external classifier), caches the scores,
//! groups and ranks the files, and writes paginated HTML reports. Duplicates
//! can be moved out of the tree before reporting.

pub mod actions;
pub mod app;
pub mod cache;
pub mod cli;
pub mod config;
pub mod error;
pub mod logging;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod record;
pub mod scanner;
pub mod scorers;

pub use app::run_app;
