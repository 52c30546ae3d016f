//! First-occurrence de-duplication on key columns
//!
//! Keys are encoded with arrow's row format, so any combination of column
//! types can form a key and equal keys encode to equal bytes.

use std::collections::HashSet;
use std::sync::Arc;

use arrow::array::{ArrayRef, BooleanArray};
use arrow::datatypes::SchemaRef;
use arrow::record_batch::RecordBatch;
use arrow::row::{RowConverter, Rows, SortField};
use rustc_hash::FxHashSet;

use crate::error::{PipelineError, Result};
use crate::filter::core::{BatchFilter, filter_record_batch};

fn key_columns(batch: &RecordBatch, columns: &[String]) -> Result<Vec<ArrayRef>> {
    columns
        .iter()
        .map(|name| {
            batch
                .column_by_name(name)
                .cloned()
                .ok_or_else(|| PipelineError::column(name.as_str(), "key column not found"))
        })
        .collect()
}

fn converter_for(schema: &SchemaRef, columns: &[String]) -> Result<RowConverter> {
    let fields = columns
        .iter()
        .map(|name| {
            let field = schema
                .field_with_name(name)
                .map_err(|_| PipelineError::column(name.as_str(), "key column not found"))?;
            Ok(SortField::new(field.data_type().clone()))
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(RowConverter::new(fields)?)
}

fn encode_keys(batch: &RecordBatch, columns: &[String]) -> Result<Rows> {
    let converter = converter_for(&batch.schema(), columns)?;
    Ok(converter.convert_columns(&key_columns(batch, columns)?)?)
}

/// Keeps the first row of every key within one batch
#[derive(Debug, Clone)]
pub struct FirstOccurrenceFilter {
    columns: Vec<String>,
}

impl FirstOccurrenceFilter {
    #[must_use]
    pub fn new(columns: &[&str]) -> Self {
        Self {
            columns: columns.iter().map(|c| (*c).to_string()).collect(),
        }
    }
}

impl BatchFilter for FirstOccurrenceFilter {
    fn filter(&self, batch: &RecordBatch) -> Result<RecordBatch> {
        let rows = encode_keys(batch, &self.columns)?;
        let mut seen: FxHashSet<&[u8]> = FxHashSet::default();
        let mask: BooleanArray = rows
            .iter()
            .map(|row| Some(seen.insert(row.data())))
            .collect();
        filter_record_batch(batch, &mask)
    }

    fn required_columns(&self) -> HashSet<String> {
        self.columns.iter().cloned().collect()
    }
}

/// Running key set that suppresses duplicates across batches
///
/// The first batch fixes the key encoding; later batches must share its schema.
#[derive(Debug)]
pub struct GlobalDedup {
    columns: Vec<String>,
    converter: Option<Arc<RowConverter>>,
    seen: FxHashSet<Box<[u8]>>,
    dropped: usize,
}

impl GlobalDedup {
    #[must_use]
    pub fn new(columns: &[&str]) -> Self {
        Self {
            columns: columns.iter().map(|c| (*c).to_string()).collect(),
            converter: None,
            seen: FxHashSet::default(),
            dropped: 0,
        }
    }

    /// Keep rows whose key has not been seen in this or any earlier batch
    pub fn retain_unseen(&mut self, batch: &RecordBatch) -> Result<RecordBatch> {
        let converter = match &self.converter {
            Some(converter) => Arc::clone(converter),
            None => {
                let converter = Arc::new(converter_for(&batch.schema(), &self.columns)?);
                self.converter = Some(Arc::clone(&converter));
                converter
            }
        };
        let rows = converter.convert_columns(&key_columns(batch, &self.columns)?)?;

        let mask: BooleanArray = rows
            .iter()
            .map(|row| {
                let key = row.data();
                let fresh = !self.seen.contains(key);
                if fresh {
                    self.seen.insert(key.into());
                }
                Some(fresh)
            })
            .collect();
        self.dropped += batch.num_rows() - mask.true_count();
        filter_record_batch(batch, &mask)
    }

    /// Distinct keys seen so far
    #[must_use]
    pub fn distinct(&self) -> usize {
        self.seen.len()
    }

    /// Rows suppressed so far
    #[must_use]
    pub const fn dropped(&self) -> usize {
        self.dropped
    }
}
