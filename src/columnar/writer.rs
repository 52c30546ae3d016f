//! Incremental columnar writer
//!
//! Chunks are appended to one open Parquet writer, so earlier chunks are never
//! rewritten. The file is written under a `.partial` sibling name and only
//! renamed into place by [`ColumnarWriter::finish`].

use std::fs::{self, File};
use std::path::{Path, PathBuf};

use arrow::datatypes::SchemaRef;
use arrow::record_batch::RecordBatch;
use parquet::arrow::ArrowWriter;
use parquet::basic::{Compression, ZstdLevel};
use parquet::file::properties::WriterProperties;

use crate::error::util::{ensure_directory, partial_path};
use crate::error::Result;

/// Row group size used while appending chunks
pub const APPEND_ROW_GROUP_SIZE: usize = 1024 * 1024;

/// Row group size of re-materialized files
pub const COMPACT_ROW_GROUP_SIZE: usize = 4 * 1024 * 1024;

/// Properties for chunk-by-chunk appends
#[must_use]
pub fn append_properties() -> WriterProperties {
    WriterProperties::builder()
        .set_compression(Compression::SNAPPY)
        .set_max_row_group_size(APPEND_ROW_GROUP_SIZE)
        .build()
}

/// Properties for the read-optimized rewrite
pub fn compact_properties() -> Result<WriterProperties> {
    Ok(WriterProperties::builder()
        .set_compression(Compression::ZSTD(ZstdLevel::try_new(6)?))
        .set_max_row_group_size(COMPACT_ROW_GROUP_SIZE)
        .build())
}

/// Appends record batches to a growing Parquet file
pub struct ColumnarWriter {
    path: PathBuf,
    partial: PathBuf,
    writer: Option<ArrowWriter<File>>,
    rows: usize,
    chunks: usize,
}

impl std::fmt::Debug for ColumnarWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ColumnarWriter")
            .field("path", &self.path)
            .field("rows", &self.rows)
            .field("chunks", &self.chunks)
            .finish_non_exhaustive()
    }
}

impl ColumnarWriter {
    /// Start a new file for `schema` at `path`
    pub fn create(path: &Path, schema: SchemaRef, props: WriterProperties) -> Result<Self> {
        if let Some(parent) = path.parent() {
            ensure_directory(parent)?;
        }
        let partial = partial_path(path);
        let file = File::create(&partial)?;
        let writer = ArrowWriter::try_new(file, schema, Some(props))?;
        Ok(Self {
            path: path.to_path_buf(),
            partial,
            writer: Some(writer),
            rows: 0,
            chunks: 0,
        })
    }

    /// Append one chunk; empty chunks are ignored
    pub fn append(&mut self, batch: &RecordBatch) -> Result<()> {
        if batch.num_rows() == 0 {
            return Ok(());
        }
        if let Some(writer) = self.writer.as_mut() {
            writer.write(batch)?;
            self.rows += batch.num_rows();
            self.chunks += 1;
        }
        Ok(())
    }

    /// Close the file and move it to its final name, returning the row count
    ///
    /// A writer that received no rows still produces a valid, empty file.
    pub fn finish(mut self) -> Result<usize> {
        if let Some(writer) = self.writer.take() {
            writer.close()?;
        }
        fs::rename(&self.partial, &self.path)?;
        Ok(self.rows)
    }
}

impl Drop for ColumnarWriter {
    fn drop(&mut self) {
        // Abandoned before finish: never leave a half-written file behind
        if self.writer.take().is_some() {
            let _ = fs::remove_file(&self.partial);
        }
    }
}
