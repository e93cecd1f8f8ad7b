//! Cache-aware scoring of a directory tree.
//!
//! # Overview
//!
//! A run walks the tree once, in file-name order, and processes it in
//! chunks of `batch_size` files:
//!
//! 1. Look every file up in the [`CacheStore`]
//! 2. For each scorer, collect the chunk's cache misses and score them with
//!    one [`Scorer::compute_batch`] call
//! 3. Fold the outcomes into the chunk's cache entries and records
//!
//! The cache is written once at the end of the run. Scoring errors never
//! stop the run: they are logged, counted per scorer and retried next time.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use bytesize::ByteSize;

use crate::cache::{CacheEntry, CacheStore, WalkMode};
use crate::progress::ProgressCallback;
use crate::record::FileRecord;
use crate::scanner::{ScanError, SourceFile, Walker};
use crate::scorers::{ScoreResult, ScorerRegistry};

/// Default number of files scored per batch.
pub const DEFAULT_BATCH_SIZE: usize = 64;

/// Name of the scoring phase reported to progress callbacks.
pub const PHASE_SCORING: &str = "scoring";

/// Errors that abort a run before any file is scored.
#[derive(thiserror::Error, Debug)]
pub enum PipelineError {
    /// The scan root is missing or not a directory.
    #[error(transparent)]
    Scan(#[from] ScanError),
}

/// A file with its record and the results of every registered scorer.
#[derive(Debug, Clone)]
pub struct ScoredFile {
    /// The file record, without scorer attributes
    pub record: FileRecord,
    /// Outcome per scorer id; scorers that failed on this file are absent
    pub results: BTreeMap<String, Option<ScoreResult>>,
}

impl ScoredFile {
    /// Result of one scorer, if it produced one.
    #[must_use]
    pub fn result(&self, scorer: &str) -> Option<&ScoreResult> {
        self.results.get(scorer).and_then(Option::as_ref)
    }
}

/// Per-scorer counters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScorerStats {
    /// Results read from the cache
    pub cached: usize,
    /// Files scored in this run
    pub computed: usize,
    /// Files scored in this run without a result
    pub no_result: usize,
    /// Files whose scoring failed
    pub failed: usize,
}

impl ScorerStats {
    /// Number of files this scorer was asked to score in this run.
    #[must_use]
    pub fn attempted(&self) -> usize {
        self.computed + self.failed
    }

    /// Whether the scorer was attempted but never produced a result.
    #[must_use]
    pub fn produced_nothing(&self) -> bool {
        self.attempted() > 0 && self.no_result + self.failed == self.attempted()
    }
}

/// Summary statistics of a run.
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    /// Files yielded by the walker
    pub total_files: usize,
    /// Total size of those files in bytes
    pub total_size: u64,
    /// Files found in the cache with every scorer's result
    pub fully_cached: usize,
    /// Walk and read errors
    pub scan_errors: usize,
    /// Whether the walk stopped at `max_files`
    pub truncated: bool,
    /// Whether the cache file was written
    pub cache_saved: bool,
    /// Counters per scorer id
    pub scorers: BTreeMap<String, ScorerStats>,
    /// Wall time of the run
    pub duration: Duration,
}

impl RunSummary {
    /// Total number of failed scorer invocations.
    #[must_use]
    pub fn failures(&self) -> usize {
        self.scorers.values().map(|s| s.failed).sum()
    }

    /// Whether anything went wrong that the operator should know about.
    #[must_use]
    pub fn has_errors(&self) -> bool {
        self.scan_errors > 0 || self.failures() > 0 || !self.cache_saved
    }

    /// Human-readable total size.
    #[must_use]
    pub fn total_size_display(&self) -> String {
        ByteSize::b(self.total_size).to_string()
    }
}

/// Output of a run: every processed file plus statistics.
#[derive(Debug)]
pub struct RunOutput {
    /// Processed files in walk order
    pub files: Vec<ScoredFile>,
    /// Run statistics
    pub summary: RunSummary,
}

/// Scores a directory tree with every scorer of a registry.
pub struct Pipeline<'a> {
    registry: &'a ScorerRegistry,
    batch_size: usize,
    max_files: Option<usize>,
    progress: Option<Box<dyn ProgressCallback + 'a>>,
}

impl<'a> Pipeline<'a> {
    /// Create a pipeline over a registry.
    #[must_use]
    pub fn new(registry: &'a ScorerRegistry) -> Self {
        Self {
            registry,
            batch_size: DEFAULT_BATCH_SIZE,
            max_files: None,
            progress: None,
        }
    }

    /// Set the number of files per scoring batch (at least 1).
    #[must_use]
    pub fn with_batch_size(mut self, size: usize) -> Self {
        self.batch_size = size.max(1);
        self
    }

    /// Stop the walk after `max` files.
    #[must_use]
    pub fn with_max_files(mut self, max: Option<usize>) -> Self {
        self.max_files = max;
        self
    }

    /// Report progress through a callback.
    #[must_use]
    pub fn with_progress_callback(mut self, callback: Box<dyn ProgressCallback + 'a>) -> Self {
        self.progress = Some(callback);
        self
    }

    /// Run the pipeline over `walker`'s tree and persist the cache.
    ///
    /// # Errors
    ///
    /// Returns an error only when the walk root is unusable. Every per-file
    /// problem is logged and counted in the summary instead.
    pub fn run(&self, walker: &Walker, cache: &mut CacheStore) -> Result<RunOutput, PipelineError> {
        let start = Instant::now();
        let root = walker.root();
        check_root(root)?;

        let mut summary = RunSummary {
            scorers: self
                .registry
                .ids()
                .into_iter()
                .map(|id| (id.to_string(), ScorerStats::default()))
                .collect(),
            ..RunSummary::default()
        };
        let mut files = Vec::new();
        let mut new_entries = BTreeMap::new();

        if let Some(progress) = &self.progress {
            progress.on_phase_start(PHASE_SCORING, 0);
        }

        let mut walk = walker.walk().peekable();
        let mut chunk: Vec<SourceFile> = Vec::with_capacity(self.batch_size);
        loop {
            if self.max_files.is_some_and(|max| summary.total_files >= max) {
                summary.truncated = walk.peek().is_some();
                break;
            }
            let Some(item) = walk.next() else {
                break;
            };
            match item {
                Ok(file) => {
                    summary.total_files += 1;
                    summary.total_size += file.size;
                    if let Some(progress) = &self.progress {
                        progress.on_progress(summary.total_files, &file.path.to_string_lossy());
                    }
                    chunk.push(file);
                    if chunk.len() >= self.batch_size {
                        self.process_chunk(
                            root,
                            &chunk,
                            cache,
                            &mut files,
                            &mut new_entries,
                            &mut summary,
                        );
                        chunk.clear();
                    }
                }
                Err(e) => {
                    log::warn!("Skipping {}: {}", e.path().display(), e);
                    summary.scan_errors += 1;
                }
            }
        }
        if !chunk.is_empty() {
            self.process_chunk(root, &chunk, cache, &mut files, &mut new_entries, &mut summary);
        }

        if let Some(progress) = &self.progress {
            progress.on_phase_end(PHASE_SCORING);
        }

        for (id, stats) in &summary.scorers {
            if stats.produced_nothing() {
                log::warn!(
                    "Scorer {} produced no result for any of {} attempted files",
                    id,
                    stats.attempted()
                );
            }
        }

        let cache_root = cache.path().parent().unwrap_or(root);
        let cache_root = cache_root
            .canonicalize()
            .unwrap_or_else(|_| cache_root.to_path_buf());
        let mode = WalkMode::for_walk(&cache_root, root, summary.truncated);
        match cache.merge_and_save(new_entries, mode) {
            Ok(()) => summary.cache_saved = true,
            Err(e) => log::error!("{e}"),
        }

        summary.duration = start.elapsed();
        log::info!(
            "Scored {} files ({}) in {:.1?}: {} fully cached, {} failures",
            summary.total_files,
            summary.total_size_display(),
            summary.duration,
            summary.fully_cached,
            summary.failures()
        );
        Ok(RunOutput { files, summary })
    }

    fn process_chunk(
        &self,
        root: &Path,
        chunk: &[SourceFile],
        cache: &CacheStore,
        files: &mut Vec<ScoredFile>,
        new_entries: &mut BTreeMap<String, CacheEntry>,
        summary: &mut RunSummary,
    ) {
        // Entry per chunk file; `None` for files that could not be read.
        let mut entries: Vec<Option<CacheEntry>> = chunk
            .iter()
            .map(|file| match cache.get(&file.identity_key()) {
                Some(entry) => Some(entry.clone()),
                None => match file.dimensions() {
                    Ok(dims) => Some(CacheEntry::new(dims)),
                    Err(e) => {
                        log::warn!("Skipping {}: {}", file.path.display(), e);
                        summary.scan_errors += 1;
                        None
                    }
                },
            })
            .collect();

        let fully_cached: Vec<bool> = entries
            .iter()
            .map(|entry| {
                entry.as_ref().is_some_and(|e| {
                    self.registry
                        .iter()
                        .all(|s| e.results.contains_key(s.id()))
                })
            })
            .collect();

        for scorer in self.registry.iter() {
            let id = scorer.id();
            let stats = summary.scorers.entry(id.to_string()).or_default();

            let mut misses = Vec::new();
            for (index, entry) in entries.iter().enumerate() {
                let Some(entry) = entry else { continue };
                if entry.results.contains_key(id) {
                    stats.cached += 1;
                } else {
                    misses.push(index);
                }
            }
            if misses.is_empty() {
                continue;
            }

            let batch: Vec<&SourceFile> = misses.iter().map(|&i| &chunk[i]).collect();
            let outcomes = scorer.compute_batch(&batch);
            for (&index, outcome) in misses.iter().zip(outcomes) {
                match outcome {
                    Ok(result) => {
                        stats.computed += 1;
                        if result.is_none() {
                            stats.no_result += 1;
                        }
                        if let Some(entry) = entries[index].as_mut() {
                            entry.results.insert(id.to_string(), result);
                        }
                    }
                    Err(e) => {
                        stats.failed += 1;
                        log::warn!("{} failed on {}: {}", id, chunk[index].path.display(), e);
                    }
                }
            }
        }

        for ((file, entry), cached) in chunk.iter().zip(entries).zip(fully_cached) {
            let Some(entry) = entry else { continue };
            if cached {
                summary.fully_cached += 1;
            }
            let key = file.identity_key();
            let record = FileRecord::new(
                key.clone(),
                relative_to(root, &file.path),
                file.size,
                entry.dimensions(),
            );
            let results = self
                .registry
                .iter()
                .filter_map(|s| {
                    entry
                        .results
                        .get(s.id())
                        .map(|r| (s.id().to_string(), r.clone()))
                })
                .collect();
            files.push(ScoredFile { record, results });
            new_entries.insert(key, entry);
        }
    }
}

fn check_root(root: &Path) -> Result<(), ScanError> {
    match std::fs::metadata(root) {
        Ok(meta) if meta.is_dir() => Ok(()),
        Ok(_) => Err(ScanError::NotADirectory(root.to_path_buf())),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(ScanError::NotFound(root.to_path_buf()))
        }
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            Err(ScanError::PermissionDenied(root.to_path_buf()))
        }
        Err(source) => Err(ScanError::Io {
            path: root.to_path_buf(),
            source,
        }),
    }
}

fn relative_to(root: &Path, path: &Path) -> PathBuf {
    path.strip_prefix(root)
        .map_or_else(|_| path.to_path_buf(), Path::to_path_buf)
}
