//! Application layer: turns parsed CLI arguments into a run.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::Context;

use crate::actions::{cleanup_tree, relocate_duplicates, relocate_tree};
use crate::cache::CacheStore;
use crate::cli::{CleanupArgs, ClassifyArgs, Cli, Commands, DedupArgs, ScanOptions};
use crate::config::{Config, ConfigError};
use crate::error::ExitCode;
use crate::logging::init_logging;
use crate::output::ReportWriter;
use crate::pipeline::{group_all, Pipeline, ScorerGroups, DEFAULT_BATCH_SIZE};
use crate::progress::{LogProgress, Progress, ProgressCallback};
use crate::record::FileRecord;
use crate::scanner::Walker;
use crate::scorers::ScorerKind;

/// Run the application for parsed CLI arguments.
///
/// # Errors
///
/// Returns configuration errors (exit code 2) before any file I/O, and
/// errors that make the run impossible, such as a missing root.
pub fn run_app(cli: Cli) -> anyhow::Result<ExitCode> {
    init_logging(cli.verbose, cli.quiet);

    let mut config = Config::load(cli.config.as_deref())?;
    match cli.command {
        Commands::Config => {
            config.validate()?;
            print!("{}", config.to_toml().context("Failed to render configuration")?);
            Ok(ExitCode::Success)
        }
        Commands::Relocate(args) => {
            let result = relocate_tree(&args.src, &args.dst)
                .with_context(|| format!("Cannot relocate {}", args.src.display()))?;
            Ok(if result.all_succeeded() {
                ExitCode::Success
            } else {
                ExitCode::PartialSuccess
            })
        }
        Commands::Cleanup(args) => {
            apply_cleanup_args(&mut config, &args);
            run_cleanup(&config, &args.src, &args.dst)
        }
        Commands::Dedup(args) => {
            let progress = args.scan.progress;
            apply_dedup_args(&mut config, &args);
            run_triage(&config, &args.scan.root, progress, cli.quiet)
        }
        Commands::Classify(args) => {
            let progress = args.scan.progress;
            apply_classify_args(&mut config, &args)?;
            run_triage(&config, &args.scan.root, progress, cli.quiet)
        }
    }
}

fn apply_scan_options(config: &mut Config, scan: &ScanOptions) {
    if scan.min_size.is_some() {
        config.min_size = scan.min_size;
    }
    if scan.max_size.is_some() {
        config.max_size = scan.max_size;
    }
    if scan.max_files.is_some() {
        config.max_files = scan.max_files;
    }
    config.skip_patterns.extend(scan.skip_patterns.iter().cloned());
    config.follow_symlinks |= scan.follow_symlinks;
    config.skip_hidden |= scan.skip_hidden;
    if let Some(cache) = &scan.cache {
        config.cache_file = cache.clone();
    }
    if let Some(dir) = &scan.report_dir {
        config.report.dir = Some(dir.clone());
    }
    if let Some(rows) = scan.rows_per_page {
        config.report.rows_per_page = rows;
    }
}

/// Apply `dedup` arguments on top of the loaded configuration.
pub fn apply_dedup_args(config: &mut Config, args: &DedupArgs) {
    apply_scan_options(config, &args.scan);
    if !args.scorers.is_empty() {
        config.scorers = args.scorers.clone();
    }
    if args.move_scorer.is_some() {
        config.move_scorer = args.move_scorer.clone();
        config.move_to = args.move_to.clone();
    }
}

/// Apply `classify` arguments and select the classifier as the only scorer.
///
/// # Errors
///
/// Returns an error if no model is configured.
pub fn apply_classify_args(config: &mut Config, args: &ClassifyArgs) -> Result<(), ConfigError> {
    apply_scan_options(config, &args.scan);
    if let Some(command) = &args.command {
        config.classifier.command = Some(command.clone());
    }
    if !args.args.is_empty() {
        config.classifier.args = args.args.clone();
    }
    if let Some(model) = &args.model {
        config.classifier.model = Some(model.clone());
    }
    if let Some(batch_size) = args.batch_size {
        config.classifier.batch_size = batch_size;
    }
    let id = config
        .classifier
        .scorer_id()
        .ok_or_else(|| ConfigError::InvalidValue {
            field: "classifier.model".to_string(),
            reason: "required by classify".to_string(),
        })?;
    config.scorers = vec![id];
    config.move_scorer = None;
    config.move_to = None;
    Ok(())
}

/// Apply `cleanup` arguments on top of the loaded configuration.
pub fn apply_cleanup_args(config: &mut Config, args: &CleanupArgs) {
    if let Some(threshold) = args.size_threshold {
        config.cleanup.size_threshold = threshold;
    }
    config.cleanup.patterns.extend(args.patterns.iter().cloned());
    if args.flatten {
        config.cleanup.keep_structure = false;
    }
}

/// Move junk files from `src` to `dst`.
///
/// # Errors
///
/// Returns configuration errors before any file I/O, and an error if `src`
/// is not a directory.
pub fn run_cleanup(config: &Config, src: &Path, dst: &Path) -> anyhow::Result<ExitCode> {
    config.validate()?;
    let options = config.cleanup_options(src)?;
    let result = cleanup_tree(src, dst, &options)
        .with_context(|| format!("Cannot clean up {}", src.display()))?;
    Ok(if result.moves.all_succeeded() {
        ExitCode::Success
    } else {
        ExitCode::PartialSuccess
    })
}

/// Score, group, optionally relocate and report the tree at `root`.
///
/// # Errors
///
/// Returns configuration errors before any file I/O, and an error if the
/// root cannot be resolved.
pub fn run_triage(
    config: &Config,
    root: &Path,
    show_progress: bool,
    quiet: bool,
) -> anyhow::Result<ExitCode> {
    config.validate()?;
    let registry = config.build_registry()?;
    let root = root
        .canonicalize()
        .with_context(|| format!("Cannot resolve root {}", root.display()))?;
    let walker = Walker::new(&root, config.walker_config(&root)?);
    let mut cache = CacheStore::load(&root.join(&config.cache_file));

    let batch_size = if registry
        .iter()
        .any(|s| s.kind() == ScorerKind::Buckets)
    {
        config.classifier.batch_size
    } else {
        DEFAULT_BATCH_SIZE
    };
    let progress: Box<dyn ProgressCallback> = if show_progress {
        Box::new(Progress::new(quiet))
    } else {
        Box::new(LogProgress::new(config.progress_every))
    };
    let output = Pipeline::new(&registry)
        .with_batch_size(batch_size)
        .with_max_files(config.max_files)
        .with_progress_callback(progress)
        .run(&walker, &mut cache)?;

    let mut sets = group_all(&registry, &output.files);
    let mut move_failures = 0;
    if let (Some(scorer), Some(move_to)) = (&config.move_scorer, &config.move_to) {
        let dst_root = std::path::absolute(move_to)
            .with_context(|| format!("Cannot resolve {}", move_to.display()))?;
        move_failures = relocate_set(&mut sets, scorer, &root, &dst_root);
    }

    let writer = ReportWriter::new(&root, config.report.clone());
    let mut report_failures = 0;
    for set in &sets {
        match writer.write(set) {
            Ok(_) => {
                if set.kind == ScorerKind::Duplicates {
                    log::info!(
                        "{}: {} duplicate groups, {} reclaimable",
                        set.scorer,
                        set.groups.len(),
                        set.reclaimable_display()
                    );
                }
            }
            Err(e) => {
                log::error!("Cannot write report for {}: {}", set.scorer, e);
                report_failures += 1;
            }
        }
    }

    if output.summary.has_errors() || move_failures > 0 || report_failures > 0 {
        Ok(ExitCode::PartialSuccess)
    } else {
        Ok(ExitCode::Success)
    }
}

/// Relocate the duplicates of `scorer` and point every report at the moved
/// files. Returns the number of failed moves.
fn relocate_set(sets: &mut [ScorerGroups], scorer: &str, root: &Path, dst_root: &Path) -> usize {
    let Some(set) = sets.iter_mut().find(|s| s.scorer == scorer) else {
        return 0;
    };
    let (groups, result) = relocate_duplicates(&set.groups, root, dst_root);
    set.groups = groups;

    let moved: HashMap<PathBuf, PathBuf> = result.moved.iter().cloned().collect();
    for other in sets.iter_mut().filter(|s| s.scorer != scorer) {
        for group in &mut other.groups {
            for member in &mut group.members {
                if let Some(dst) = moved_to(&moved, root, member) {
                    *member = member.with_path(dst.clone());
                }
            }
        }
    }
    result.failure_count()
}

fn moved_to<'m>(
    moved: &'m HashMap<PathBuf, PathBuf>,
    root: &Path,
    record: &FileRecord,
) -> Option<&'m PathBuf> {
    if record.is_relocated() {
        return None;
    }
    moved.get(&root.join(&record.relative_path))
}
