//! Progress reporting for pipeline runs.
//!
//! The pipeline reports through the [`ProgressCallback`] trait. Two
//! implementations are provided:
//!
//! - [`LogProgress`]: a log line every N files, suited to unattended runs
//!   and tests
//! - [`Progress`]: an `indicatif` spinner for interactive terminals

use std::cell::RefCell;
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};

/// Callback trait for progress reporting.
pub trait ProgressCallback {
    /// Called when a phase starts. `total` is 0 when the size is unknown.
    fn on_phase_start(&self, phase: &str, total: usize);

    /// Called after each processed item.
    fn on_progress(&self, current: usize, path: &str);

    /// Called when a phase ends.
    fn on_phase_end(&self, phase: &str);

    /// Free-form status message.
    fn on_message(&self, _message: &str) {}
}

/// Logs one line every `every` items.
#[derive(Debug, Clone)]
pub struct LogProgress {
    every: usize,
}

impl LogProgress {
    /// Create a reporter logging every `every` items (at least 1).
    #[must_use]
    pub fn new(every: usize) -> Self {
        Self {
            every: every.max(1),
        }
    }
}

impl ProgressCallback for LogProgress {
    fn on_phase_start(&self, phase: &str, total: usize) {
        if total > 0 {
            log::info!("{phase}: {total} items");
        } else {
            log::info!("{phase}...");
        }
    }

    fn on_progress(&self, current: usize, path: &str) {
        if current % self.every == 0 {
            log::info!("{current} files processed ({path})");
        }
    }

    fn on_phase_end(&self, phase: &str) {
        log::info!("{phase} complete");
    }

    fn on_message(&self, message: &str) {
        log::info!("{message}");
    }
}

/// Terminal spinner backed by `indicatif`.
pub struct Progress {
    bar: RefCell<Option<ProgressBar>>,
    quiet: bool,
}

impl Progress {
    /// Create a spinner reporter. Nothing is drawn when `quiet` is set.
    #[must_use]
    pub fn new(quiet: bool) -> Self {
        Self {
            bar: RefCell::new(None),
            quiet,
        }
    }

    fn style(total: usize) -> ProgressStyle {
        if total > 0 {
            ProgressStyle::with_template(
                "[{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({percent}%) {msg}",
            )
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("█>-")
        } else {
            ProgressStyle::with_template("{spinner:.green} [{elapsed_precise}] {pos} files {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner())
                .tick_chars("⠁⠂⠄⡀⢀⠠⠐⠈ ")
        }
    }
}

impl ProgressCallback for Progress {
    fn on_phase_start(&self, phase: &str, total: usize) {
        if self.quiet {
            return;
        }
        let pb = if total > 0 {
            ProgressBar::new(total as u64)
        } else {
            ProgressBar::new_spinner()
        };
        pb.set_style(Self::style(total));
        pb.set_message(phase.to_string());
        pb.enable_steady_tick(Duration::from_millis(100));
        if let Some(old) = self.bar.replace(Some(pb)) {
            old.finish_and_clear();
        }
    }

    fn on_progress(&self, current: usize, path: &str) {
        if let Some(pb) = self.bar.borrow().as_ref() {
            pb.set_position(current as u64);
            pb.set_message(truncate_path(path, 40));
        }
    }

    fn on_phase_end(&self, phase: &str) {
        if let Some(pb) = self.bar.borrow_mut().take() {
            pb.finish_with_message(format!("{phase} complete"));
        }
    }

    fn on_message(&self, message: &str) {
        match self.bar.borrow().as_ref() {
            Some(pb) => pb.println(message),
            None if !self.quiet => eprintln!("{message}"),
            None => {}
        }
    }
}

/// Keep the last `max_len` characters of a path, prefixed with `...`.
fn truncate_path(path: &str, max_len: usize) -> String {
    let count = path.chars().count();
    if count <= max_len {
        return path.to_string();
    }
    let tail: String = path.chars().skip(count - max_len + 3).collect();
    format!("...{tail}")
}
