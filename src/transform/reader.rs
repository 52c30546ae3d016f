//! Chunked reader for the raw registry files
//!
//! The files are semicolon-delimited, Latin-1 encoded and have no header.
//! Rows are read as raw bytes, projected to the configured columns and
//! collected column-major into chunks of a fixed row count. Rows of the wrong
//! width are counted and skipped.

use std::io::Read;
use std::path::Path;

use csv::{ByteRecord, ReaderBuilder};

use crate::error::util::safe_open_file;
use crate::error::Result;
use crate::schema::EntitySchema;

/// Column-major block of projected raw values
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawChunk {
    /// One vector per projected field, in schema order
    pub columns: Vec<Vec<String>>,
    /// Number of rows in every column
    pub rows: usize,
}

impl RawChunk {
    fn with_capacity(width: usize, rows: usize) -> Self {
        Self {
            columns: (0..width).map(|_| Vec::with_capacity(rows)).collect(),
            rows: 0,
        }
    }

    /// Whether the chunk holds no rows
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.rows == 0
    }
}

/// Decode Latin-1 bytes; every byte maps to the code point of the same value
#[must_use]
pub fn decode_latin1(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| char::from(b)).collect()
}

/// Streams [`RawChunk`]s out of one raw file
pub struct RawChunkReader<R: Read> {
    inner: csv::Reader<R>,
    schema: EntitySchema,
    chunk_size: usize,
    record: ByteRecord,
    rows_read: usize,
    rows_skipped: usize,
    done: bool,
}

impl RawChunkReader<std::fs::File> {
    /// Open a raw file on disk
    pub fn open(path: &Path, schema: EntitySchema, chunk_size: usize) -> Result<Self> {
        let file = safe_open_file(path, "raw registry file")?;
        Ok(Self::new(file, schema, chunk_size))
    }
}

impl<R: Read> RawChunkReader<R> {
    /// Wrap any byte source
    pub fn new(source: R, schema: EntitySchema, chunk_size: usize) -> Self {
        let inner = ReaderBuilder::new()
            .delimiter(b';')
            .has_headers(false)
            .flexible(true)
            .from_reader(source);
        Self {
            inner,
            schema,
            chunk_size: chunk_size.max(1),
            record: ByteRecord::new(),
            rows_read: 0,
            rows_skipped: 0,
            done: false,
        }
    }

    /// Rows accepted so far
    #[must_use]
    pub const fn rows_read(&self) -> usize {
        self.rows_read
    }

    /// Malformed rows skipped so far
    #[must_use]
    pub const fn rows_skipped(&self) -> usize {
        self.rows_skipped
    }

    /// Read up to `chunk_size` rows; `None` once the input is exhausted
    pub fn next_chunk(&mut self) -> Result<Option<RawChunk>> {
        if self.done {
            return Ok(None);
        }

        let indices = self.schema.source_indices();
        let mut chunk = RawChunk::with_capacity(indices.len(), self.chunk_size.min(1 << 20));

        while chunk.rows < self.chunk_size {
            match self.inner.read_byte_record(&mut self.record) {
                Ok(true) => {}
                Ok(false) => {
                    self.done = true;
                    break;
                }
                Err(e) if e.is_io_error() => return Err(e.into()),
                Err(e) => {
                    log::debug!("Skipping unreadable row: {e}");
                    self.rows_skipped += 1;
                    continue;
                }
            }

            if !self.schema.accepts_width(self.record.len()) {
                self.rows_skipped += 1;
                continue;
            }

            for (column, &index) in chunk.columns.iter_mut().zip(indices.iter()) {
                column.push(decode_latin1(self.record.get(index).unwrap_or_default()));
            }
            chunk.rows += 1;
        }

        self.rows_read += chunk.rows;
        if chunk.is_empty() {
            Ok(None)
        } else {
            Ok(Some(chunk))
        }
    }
}

impl<R: Read> Iterator for RawChunkReader<R> {
    type Item = Result<RawChunk>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_chunk().transpose()
    }
}
