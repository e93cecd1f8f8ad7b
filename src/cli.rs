//! Command-line interface definitions for imgtriage.
//!
//! This module defines all CLI arguments, subcommands, and options using the clap derive API.
//! Global options (verbosity, config file) apply to every subcommand; options given here
//! override the configuration file and `IMGTRIAGE_*` environment variables.
//!
//! # Example
//!
//! ```bash
//! # Find exact and near duplicates, writing reports into the tree
//! imgtriage dedup ~/Pictures
//!
//! # Move exact duplicates out of the tree before reporting
//! imgtriage dedup ~/Pictures --move-scorer blake3 --move-to ~/dups
//!
//! # Bucket images with an external classifier
//! imgtriage classify ~/Pictures --command ./classify.sh --model nsfw_mobilenet
//!
//! # Move tiny files and non-images aside before triage
//! imgtriage cleanup ~/Downloads/site ~/junk --pattern '_avatar_.*\.jpg$'
//!
//! # Print the effective configuration
//! imgtriage config
//! ```

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Offline image triage: duplicates, content buckets and HTML reports.
#[derive(Debug, Parser)]
#[command(name = "imgtriage")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Increase verbosity level (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Configuration file (default: platform config directory)
    #[arg(long, value_name = "PATH", global = true)]
    pub config: Option<PathBuf>,

    /// Print fatal errors as JSON on stderr
    #[arg(long, global = true)]
    pub json_errors: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Find exact and perceptual duplicates and write reports
    Dedup(DedupArgs),
    /// Bucket images by classifier severity and write reports
    Classify(ClassifyArgs),
    /// Move every file of a tree under another root, keeping its structure
    Relocate(RelocateArgs),
    /// Move small files, files with matching names and non-images aside
    Cleanup(CleanupArgs),
    /// Print the effective configuration as TOML
    Config,
}

/// Walk and report options shared by scanning subcommands.
#[derive(Debug, Args)]
pub struct ScanOptions {
    /// Root directory to scan
    #[arg(value_name = "ROOT")]
    pub root: PathBuf,

    /// Minimum file size to consider (e.g., 1KB, 1MB, 1GB)
    ///
    /// Supports suffixes: B, KB, KiB, MB, MiB, GB, GiB, TB, TiB
    #[arg(long, value_name = "SIZE", value_parser = parse_size)]
    pub min_size: Option<u64>,

    /// Maximum file size to consider (e.g., 1KB, 1MB, 1GB)
    ///
    /// Supports suffixes: B, KB, KiB, MB, MiB, GB, GiB, TB, TiB
    #[arg(long, value_name = "SIZE", value_parser = parse_size)]
    pub max_size: Option<u64>,

    /// Stop after this many files
    #[arg(long, value_name = "N")]
    pub max_files: Option<usize>,

    /// Regular expressions of file names to skip (can be specified multiple times)
    #[arg(long = "skip", value_name = "REGEX")]
    pub skip_patterns: Vec<String>,

    /// Follow symbolic links during scan
    #[arg(long)]
    pub follow_symlinks: bool,

    /// Skip hidden files and directories (starting with .)
    #[arg(long)]
    pub skip_hidden: bool,

    /// Cache file, relative to ROOT unless absolute
    #[arg(long, value_name = "PATH")]
    pub cache: Option<PathBuf>,

    /// Report directory, relative to ROOT
    #[arg(long, value_name = "DIR")]
    pub report_dir: Option<PathBuf>,

    /// Maximum rows per report page
    #[arg(long, value_name = "N")]
    pub rows_per_page: Option<usize>,

    /// Show a progress spinner instead of periodic log lines
    #[arg(long)]
    pub progress: bool,
}

/// Arguments for the dedup subcommand.
#[derive(Debug, Args)]
pub struct DedupArgs {
    #[command(flatten)]
    pub scan: ScanOptions,

    /// Scorer to run (can be specified multiple times; default: all duplicate scorers)
    #[arg(long = "scorer", value_name = "ID")]
    pub scorers: Vec<String>,

    /// Scorer whose duplicate groups are moved out of the tree
    #[arg(long, value_name = "ID", requires = "move_to")]
    pub move_scorer: Option<String>,

    /// Destination root for moved duplicates
    #[arg(long, value_name = "DIR", requires = "move_scorer")]
    pub move_to: Option<PathBuf>,
}

/// Arguments for the classify subcommand.
#[derive(Debug, Args)]
pub struct ClassifyArgs {
    #[command(flatten)]
    pub scan: ScanOptions,

    /// Classifier program; receives image paths and prints JSON scores
    #[arg(long, value_name = "PROG")]
    pub command: Option<PathBuf>,

    /// Argument passed to the classifier before the paths (repeatable)
    #[arg(long = "arg", value_name = "ARG", allow_hyphen_values = true)]
    pub args: Vec<String>,

    /// Model name; part of the scorer id and cache key
    #[arg(long, value_name = "NAME")]
    pub model: Option<String>,

    /// Paths per classifier invocation
    #[arg(long, value_name = "N")]
    pub batch_size: Option<usize>,
}

/// Arguments for the relocate subcommand.
#[derive(Debug, Args)]
pub struct RelocateArgs {
    /// Tree to move files from
    #[arg(value_name = "SRC")]
    pub src: PathBuf,

    /// Root to move files to
    #[arg(value_name = "DST")]
    pub dst: PathBuf,
}

/// Arguments for the cleanup subcommand.
#[derive(Debug, Args)]
pub struct CleanupArgs {
    /// Tree to clean up
    #[arg(value_name = "SRC")]
    pub src: PathBuf,

    /// Root to move junk files to
    #[arg(value_name = "DST")]
    pub dst: PathBuf,

    /// Files smaller than this are moved (default: 20KiB)
    #[arg(long, value_name = "SIZE", value_parser = parse_size)]
    pub size_threshold: Option<u64>,

    /// Regular expression of file names to move (can be specified multiple times)
    #[arg(long = "pattern", value_name = "REGEX")]
    pub patterns: Vec<String>,

    /// Put every moved file directly under DST with a unique suffix
    #[arg(long)]
    pub flatten: bool,
}

/// Parse a human-readable size string into bytes.
///
/// Supports suffixes: B, KB, KiB, MB, MiB, GB, GiB, TB, TiB
/// Case-insensitive. Numbers without suffix are treated as bytes.
///
/// # Examples
///
/// ```
/// use imgtriage::cli::parse_size;
///
/// assert_eq!(parse_size("1024").unwrap(), 1024);
/// assert_eq!(parse_size("1KB").unwrap(), 1000);
/// assert_eq!(parse_size("1KiB").unwrap(), 1024);
/// assert_eq!(parse_size("1MiB").unwrap(), 1_048_576);
/// ```
/// # Errors
///
/// Returns an error if the string is empty, contains an invalid number,
/// a negative number, or an unknown size suffix.
pub fn parse_size(s: &str) -> Result<u64, String> {
    let s = s.trim();
    if s.is_empty() {
        return Err("Size cannot be empty".to_string());
    }

    let (num_str, suffix) = match s.find(|c: char| !c.is_ascii_digit() && c != '.') {
        Some(idx) => (&s[..idx], s[idx..].trim().to_uppercase()),
        None => (s, String::new()),
    };

    let num: f64 = num_str
        .parse()
        .map_err(|_| format!("Invalid number: '{num_str}'"))?;

    let multiplier: u64 = match suffix.as_str() {
        "" | "B" => 1,
        "KB" | "K" => 1_000,
        "KIB" => 1_024,
        "MB" | "M" => 1_000_000,
        "MIB" => 1_048_576,
        "GB" | "G" => 1_000_000_000,
        "GIB" => 1_073_741_824,
        "TB" | "T" => 1_000_000_000_000,
        "TIB" => 1_099_511_627_776,
        _ => return Err(format!("Unknown size suffix: '{suffix}'")),
    };

    Ok((num * multiplier as f64) as u64)
}
