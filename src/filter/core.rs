//! Core filtering functionality
//!
//! Defines the [`BatchFilter`] trait applied to normalized chunks and the
//! helpers shared by every filter implementation.

use std::collections::HashSet;

use arrow::array::{Array, BooleanArray, StringArray};
use arrow::record_batch::RecordBatch;

use crate::error::{PipelineError, Result};

/// Filter a record batch based on a boolean mask
///
/// # Arguments
/// * `batch` - The record batch to filter
/// * `mask` - The boolean mask indicating which rows to keep
///
/// # Returns
/// A new record batch with only rows where mask is true
pub fn filter_record_batch(batch: &RecordBatch, mask: &BooleanArray) -> Result<RecordBatch> {
    if batch.num_rows() != mask.len() {
        return Err(PipelineError::column(
            "<mask>",
            format!(
                "mask length ({}) doesn't match batch row count ({})",
                mask.len(),
                batch.num_rows()
            ),
        ));
    }

    // Nothing to drop, skip the copy
    if mask.null_count() == 0 && mask.true_count() == batch.num_rows() {
        return Ok(batch.clone());
    }

    Ok(arrow::compute::filter_record_batch(batch, mask)?)
}

/// Look up a Utf8 column by name
pub fn string_column<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a StringArray> {
    let column = batch
        .column_by_name(name)
        .ok_or_else(|| PipelineError::column(name, "not found in record batch"))?;
    column
        .as_any()
        .downcast_ref::<StringArray>()
        .ok_or_else(|| {
            PipelineError::column(name, format!("expected Utf8, found {}", column.data_type()))
        })
}

/// Trait for objects that can filter record batches
pub trait BatchFilter: std::fmt::Debug {
    /// Filter a record batch
    ///
    /// # Arguments
    /// * `batch` - The record batch to filter
    ///
    /// # Returns
    /// A filtered record batch
    fn filter(&self, batch: &RecordBatch) -> Result<RecordBatch>;

    /// Returns the set of column names required by this filter
    fn required_columns(&self) -> HashSet<String>;
}

/// Filters applied one after the other, stopping early once a batch is empty
#[derive(Debug, Default)]
pub struct FilterChain {
    filters: Vec<Box<dyn BatchFilter + Send + Sync>>,
}

impl FilterChain {
    /// Create an empty chain, which keeps every row
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a filter
    #[must_use]
    pub fn with(mut self, filter: impl BatchFilter + Send + Sync + 'static) -> Self {
        self.filters.push(Box::new(filter));
        self
    }

    /// Whether the chain keeps every row
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }
}

impl BatchFilter for FilterChain {
    fn filter(&self, batch: &RecordBatch) -> Result<RecordBatch> {
        let mut result = batch.clone();
        for filter in &self.filters {
            if result.num_rows() == 0 {
                break;
            }
            result = filter.filter(&result)?;
        }
        Ok(result)
    }

    fn required_columns(&self) -> HashSet<String> {
        self.filters
            .iter()
            .flat_map(|f| f.required_columns())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use arrow::datatypes::{DataType, Field, Schema};

    fn batch(ids: &[&str]) -> RecordBatch {
        let schema = Arc::new(Schema::new(vec![Field::new("root_id", DataType::Utf8, true)]));
        RecordBatch::try_new(schema, vec![Arc::new(StringArray::from(ids.to_vec()))]).unwrap()
    }

    #[test]
    fn mask_filtering() {
        let b = batch(&["1", "2", "3"]);
        let mask = BooleanArray::from(vec![true, false, true]);
        let filtered = filter_record_batch(&b, &mask).unwrap();
        let ids = string_column(&filtered, "root_id").unwrap();
        assert_eq!(ids.value(0), "1");
        assert_eq!(ids.value(1), "3");
        assert_eq!(filtered.num_rows(), 2);
    }

    #[test]
    fn mask_length_mismatch() {
        let b = batch(&["1", "2"]);
        let mask = BooleanArray::from(vec![true]);
        assert!(filter_record_batch(&b, &mask).is_err());
    }

    #[test]
    fn missing_column() {
        let b = batch(&["1"]);
        assert!(string_column(&b, "other").is_err());
    }

    #[test]
    fn empty_chain_keeps_everything() {
        let b = batch(&["1", "2"]);
        let chain = FilterChain::new();
        assert!(chain.is_empty());
        assert_eq!(chain.filter(&b).unwrap().num_rows(), 2);
    }
}
