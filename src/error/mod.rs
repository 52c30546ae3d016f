//! Error handling for the pipeline.

pub mod util;

use std::path::PathBuf;

use arrow::error::ArrowError;
use parquet::errors::ParquetError;

/// Errors raised by any pipeline stage
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// Error opening, reading or writing a file
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Arrow compute or array construction failed
    #[error("Arrow error: {0}")]
    Arrow(#[from] ArrowError),

    /// Parquet read or write failed
    #[error("Parquet error: {0}")]
    Parquet(#[from] ParquetError),

    /// Raw CSV stream could not be read
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Archive could not be opened or read
    #[error("Zip error: {0}")]
    Zip(#[from] zip::result::ZipError),

    /// HTTP transfer failed
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Transactional store error
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Analytic store error
    #[error("DuckDB error: {0}")]
    DuckDb(#[from] duckdb::Error),

    /// Config or report (de)serialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Remote server answered with a non-success status
    #[error("download of {url} failed with status {status}")]
    Download { url: String, status: u16 },

    /// An archive did not contain exactly one inner file
    #[error("archive {} holds {entries} entries, expected exactly one", path.display())]
    ArchiveShape { path: PathBuf, entries: usize },

    /// The partner columnar file was not there when a filtered transform started
    #[error("reference set {} is missing; partners must be transformed first", .0.display())]
    MissingReferenceSet(PathBuf),

    /// A column was absent or had an unexpected type
    #[error("column '{column}': {reason}")]
    Column { column: String, reason: String },

    /// Invalid configuration
    #[error("configuration error: {0}")]
    Config(String),

    /// A blocking or async task panicked or was cancelled
    #[error("task failed: {0}")]
    TaskJoin(String),
}

impl PipelineError {
    /// Shorthand for a column error
    pub fn column(column: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Column {
            column: column.into(),
            reason: reason.into(),
        }
    }
}

impl From<tokio::task::JoinError> for PipelineError {
    fn from(error: tokio::task::JoinError) -> Self {
        Self::TaskJoin(error.to_string())
    }
}

/// Result type for pipeline operations
pub type Result<T> = std::result::Result<T, PipelineError>;
