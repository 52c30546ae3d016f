//! Lexicographic sorting of record batches

use arrow::array::ArrayRef;
use arrow::compute::{SortColumn, SortOptions, lexsort_to_indices, take_record_batch};
use arrow::record_batch::RecordBatch;

use crate::error::{PipelineError, Result};

/// Ascending order, nulls placed after every value
const KEY_ORDER: SortOptions = SortOptions {
    descending: false,
    nulls_first: false,
};

/// Sort a batch by the given key columns
///
/// An empty key list or a batch with fewer than two rows is returned as is.
pub fn sort_batch<S: AsRef<str>>(batch: &RecordBatch, keys: &[S]) -> Result<RecordBatch> {
    if keys.is_empty() || batch.num_rows() < 2 {
        return Ok(batch.clone());
    }

    let columns = keys
        .iter()
        .map(|key| {
            let key = key.as_ref();
            let values: &ArrayRef = batch
                .column_by_name(key)
                .ok_or_else(|| PipelineError::column(key, "sort key not found"))?;
            Ok(SortColumn {
                values: values.clone(),
                options: Some(KEY_ORDER),
            })
        })
        .collect::<Result<Vec<_>>>()?;

    let indices = lexsort_to_indices(&columns, None)?;
    Ok(take_record_batch(batch, &indices)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use arrow::array::{Array, Date32Array, StringArray};
    use arrow::datatypes::{DataType, Field, Schema};

    #[test]
    fn sorts_by_date_then_name_with_nulls_last() {
        let schema = Arc::new(Schema::new(vec![
            Field::new("partnership_start", DataType::Date32, true),
            Field::new("partner_name", DataType::Utf8, true),
        ]));
        let batch = RecordBatch::try_new(
            schema,
            vec![
                Arc::new(Date32Array::from(vec![Some(10), None, Some(5), Some(10)])),
                Arc::new(StringArray::from(vec!["B", "Z", "C", "A"])),
            ],
        )
        .unwrap();

        let sorted = sort_batch(&batch, &["partnership_start", "partner_name"]).unwrap();
        let names = sorted
            .column(1)
            .as_any()
            .downcast_ref::<StringArray>()
            .unwrap();
        let order: Vec<&str> = (0..names.len()).map(|i| names.value(i)).collect();
        assert_eq!(order, vec!["C", "A", "B", "Z"]);
    }

    #[test]
    fn unknown_key_is_an_error() {
        let schema = Arc::new(Schema::new(vec![Field::new("a", DataType::Utf8, true)]));
        let batch =
            RecordBatch::try_new(schema, vec![Arc::new(StringArray::from(vec!["x", "y"]))])
                .unwrap();
        assert!(sort_batch(&batch, &["b"]).is_err());
    }
}
