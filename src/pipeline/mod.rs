//! The score-and-group pipeline.
//!
//! This module provides:
//! - [`runner`]: Cache-aware, batched scoring of a directory tree
//! - [`groups`]: Grouping of scored files and ranking within each group
//!
//! # Example
//!
//! ```no_run
//! use imgtriage::cache::CacheStore;
//! use imgtriage::config::Config;
//! use imgtriage::pipeline::{group_all, Pipeline};
//! use imgtriage::scanner::Walker;
//! use std::path::Path;
//!
//! let config = Config::default();
//! let root = Path::new("/photos");
//! let registry = config.build_registry().unwrap();
//! let walker = Walker::new(root, config.walker_config(root).unwrap());
//! let mut cache = CacheStore::load(&root.join(&config.cache_file));
//!
//! let output = Pipeline::new(&registry).run(&walker, &mut cache).unwrap();
//! for set in group_all(&registry, &output.files) {
//!     println!("{}: {} groups", set.scorer, set.groups.len());
//! }
//! ```

pub mod groups;
pub mod runner;

pub use groups::{group_all, group_records, Group, ScorerGroups};
pub use runner::{
    Pipeline, PipelineError, RunOutput, RunSummary, ScoredFile, ScorerStats, DEFAULT_BATCH_SIZE,
};
