//! Logging helpers
//!
//! Stage boundaries are logged in one consistent format so that a run can be
//! followed (and grepped) across download, extraction, transform and load.

use std::path::Path;
use std::time::Duration;

/// Log that a stage starts working on a file or directory
pub fn log_operation_start(operation: &str, path: &Path) {
    log::info!("{operation} {}", path.display());
}

/// Log the end of a stage step with the rows it handled
///
/// # Arguments
/// * `operation` - Past-tense verb, e.g. `"loaded"`
/// * `path` - File or directory the rows came from
/// * `rows` - Rows handled
/// * `elapsed` - Time taken, when measured
pub fn log_operation_complete(operation: &str, path: &Path, rows: usize, elapsed: Option<Duration>) {
    match elapsed {
        Some(duration) => log::info!("{}: {operation} {rows} rows in {duration:.2?}", path.display()),
        None => log::info!("{}: {operation} {rows} rows", path.display()),
    }
}

/// Log that an existing output made a step unnecessary
pub fn log_skip(reason: &str, path: &Path) {
    log::info!("Skipping, {reason}: {}", path.display());
}

/// Warn about a tolerated problem, optionally tied to a path
pub fn log_warning(message: &str, path: Option<&Path>) {
    match path {
        Some(path) => log::warn!("{message}: {}", path.display()),
        None => log::warn!("{message}"),
    }
}

/// Log a measured query latency
pub fn log_timing(label: &str, elapsed: Duration, rows: usize) {
    log::info!("[timing] {label}: {rows} rows in {elapsed:?}");
}
