//! Scratch trees and one-call runs shared by the integration tests.

use std::fs;
use std::path::{Path, PathBuf};

use image::{GrayImage, Luma};
use imgtriage::cache::CacheStore;
use imgtriage::config::Config;
use imgtriage::pipeline::{group_all, Pipeline, RunOutput, ScorerGroups};
use imgtriage::scanner::Walker;
use tempfile::{tempdir, TempDir};

/// A temporary directory and its canonical path.
pub fn scratch() -> (TempDir, PathBuf) {
    let dir = tempdir().unwrap();
    let root = dir.path().canonicalize().unwrap();
    (dir, root)
}

/// Square grayscale PNG, half black and half white.
///
/// The split is horizontal unless `vertical` is set. Every size of the same
/// split has the same perceptual hash.
pub fn split_png(path: &Path, size: u32, vertical: bool) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    let img = GrayImage::from_fn(size, size, |x, y| {
        let v = if vertical { x } else { y };
        Luma([if v < size / 2 { 0 } else { 255 }])
    });
    img.save(path).unwrap();
}

/// Default configuration running only the given scorers.
pub fn config(scorers: &[&str]) -> Config {
    Config {
        scorers: scorers.iter().map(|s| (*s).to_string()).collect(),
        ..Config::default()
    }
}

/// Score the tree at `root` once.
pub fn run(root: &Path, config: &Config) -> RunOutput {
    let registry = config.build_registry().unwrap();
    let walker = Walker::new(root, config.walker_config(root).unwrap());
    let mut cache = CacheStore::load(&root.join(&config.cache_file));
    let output = Pipeline::new(&registry)
        .with_max_files(config.max_files)
        .run(&walker, &mut cache)
        .unwrap();
    output
}

/// Score and group the tree at `root`.
pub fn grouped(root: &Path, config: &Config) -> Vec<ScorerGroups> {
    let registry = config.build_registry().unwrap();
    let output = run(root, config);
    group_all(&registry, &output.files)
}

/// Report pages under `dir`, sorted by name.
pub fn pages(dir: &Path) -> Vec<PathBuf> {
    let mut pages: Vec<_> = fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().path())
        .filter(|p| p.extension().is_some_and(|e| e == "html"))
        .collect();
    pages.sort();
    pages
}

/// Names of the given paths.
pub fn names(paths: &[PathBuf]) -> Vec<String> {
    paths
        .iter()
        .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
        .collect()
}
