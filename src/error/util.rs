//! Utility functions for error handling
//!
//! File system helpers that attach the offending path and purpose to IO errors.

use std::fs;
use std::io;
use std::path::Path;

use crate::error::{PipelineError, Result};

/// Safely open a file with rich error information
///
/// # Arguments
/// * `path` - The path to the file to open
/// * `purpose` - Why the file is being opened (for error context)
pub fn safe_open_file(path: &Path, purpose: &str) -> Result<fs::File> {
    if !path.is_file() {
        return Err(PipelineError::Io(io::Error::new(
            io::ErrorKind::NotFound,
            format!("{} is not a file (needed for: {purpose})", path.display()),
        )));
    }

    fs::File::open(path).map_err(|e| {
        let context = match e.kind() {
            io::ErrorKind::PermissionDenied => "permission denied - check file permissions",
            io::ErrorKind::NotFound => "file disappeared during operation",
            _ => "failed to open file",
        };
        PipelineError::Io(io::Error::new(
            e.kind(),
            format!("{context}: {} ({purpose}): {e}", path.display()),
        ))
    })
}

/// Create a directory (and its parents) if it does not exist yet
pub fn ensure_directory(path: &Path) -> Result<()> {
    fs::create_dir_all(path).map_err(|e| {
        PipelineError::Io(io::Error::new(
            e.kind(),
            format!("cannot create directory {}: {e}", path.display()),
        ))
    })
}

/// Sibling path used while a file is being written
///
/// Outputs are renamed from this path once complete so that an interrupted
/// run never leaves something that looks finished.
#[must_use]
pub fn partial_path(path: &Path) -> std::path::PathBuf {
    let mut name = path
        .file_name()
        .map(std::ffi::OsStr::to_os_string)
        .unwrap_or_default();
    name.push(".partial");
    path.with_file_name(name)
}
