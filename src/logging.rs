//! Logging through the `log` facade with an `env_logger` backend.
//!
//! `RUST_LOG` wins when set. Otherwise `--quiet` keeps errors only and each
//! `--verbose` lowers the threshold one step below info; `-v` also tags
//! lines with the module that logged them. Debug builds add a timestamp.

use std::io::Write;

use env_logger::{Builder, Env};
use log::LevelFilter;

/// Install the global logger for the given CLI flags.
///
/// Only the first call in a process installs a logger; later calls are
/// ignored.
pub fn init_logging(verbose: u8, quiet: bool) {
    let level = level_for(verbose, quiet);
    let installed = Builder::from_env(Env::default().default_filter_or(level.to_string()))
        .format(move |buf, record| {
            if cfg!(debug_assertions) {
                write!(buf, "{} ", buf.timestamp_seconds())?;
            }
            let style = buf.default_level_style(record.level());
            write!(buf, "{style}{:<5}{style:#} ", record.level())?;
            if verbose > 0 {
                write!(buf, "[{}] ", record.module_path().unwrap_or("?"))?;
            }
            writeln!(buf, "{}", record.args())
        })
        .try_init();
    if installed.is_ok() {
        log::debug!("Logging at {}", log::max_level());
    }
}

fn level_for(verbose: u8, quiet: bool) -> LevelFilter {
    match (quiet, verbose) {
        (true, _) => LevelFilter::Error,
        (false, 0) => LevelFilter::Info,
        (false, 1) => LevelFilter::Debug,
        (false, _) => LevelFilter::Trace,
    }
}
