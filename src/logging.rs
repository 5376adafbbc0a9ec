//! File-backed logging.
//!
//! Diagnostics go to an append-only log in the data directory through the
//! `log` facade; `env_logger` does the filtering and formatting.

use chrono::Local;
use env_logger::{Builder, Target};
use log::LevelFilter;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::Path;

/// Initialize the global logger.
///
/// `RUST_LOG` overrides the default level. If the log file cannot be
/// opened, output falls back to stderr rather than being lost.
pub fn init(log_path: &Path, verbose: bool) {
    let default_level = if verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };

    let mut builder = Builder::new();
    builder
        .filter_level(default_level)
        .parse_default_env()
        .format(|buf, record| {
            writeln!(
                buf,
                "[{}] [{}] {}",
                Local::now().format("%Y-%m-%d %H:%M:%S"),
                record.level(),
                record.args()
            )
        });

    if let Some(parent) = log_path.parent() {
        let _ = fs::create_dir_all(parent);
    }

    match OpenOptions::new().create(true).append(true).open(log_path) {
        Ok(file) => {
            builder.target(Target::Pipe(Box::new(file)));
        }
        Err(e) => {
            eprintln!("cannot open log file {}: {}", log_path.display(), e);
            builder.target(Target::Stderr);
        }
    }

    // A second init (e.g. from tests) keeps the first logger.
    let _ = builder.try_init();
}
