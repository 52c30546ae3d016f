//! Read-optimized rewrite of a finished columnar file
//!
//! The appended file only carries per-chunk order. Rewriting it loads the
//! whole dataset, sorts it globally and stores it with heavier compression and
//! larger row groups.

use std::path::Path;
use std::time::Instant;

use arrow::compute::concat_batches;
use arrow::record_batch::RecordBatchReader;

use crate::columnar::reader::{DEFAULT_BATCH_SIZE, open_batches};
use crate::columnar::sort::sort_batch;
use crate::columnar::writer::{ColumnarWriter, compact_properties};
use crate::error::Result;
use crate::utils::logging::{log_operation_complete, log_operation_start};

/// Sort `path` globally by `keys` and rewrite it in place
pub fn rematerialize<S: AsRef<str>>(path: &Path, keys: &[S]) -> Result<usize> {
    log_operation_start("Re-materializing", path);
    let start = Instant::now();

    let reader = open_batches(path, DEFAULT_BATCH_SIZE, None)?;
    let schema = reader.schema();
    let batches = reader.collect::<std::result::Result<Vec<_>, _>>()?;
    let combined = concat_batches(&schema, &batches)?;
    drop(batches);
    let sorted = sort_batch(&combined, keys)?;
    drop(combined);

    let mut writer = ColumnarWriter::create(path, schema, compact_properties()?)?;
    writer.append(&sorted)?;
    let rows = writer.finish()?;

    log_operation_complete("re-materialized", path, rows, Some(start.elapsed()));
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use arrow::array::{Array, StringArray};
    use arrow::datatypes::{DataType, Field, Schema};
    use arrow::record_batch::RecordBatch;

    use crate::columnar::reader::read_all;
    use crate::columnar::writer::append_properties;

    #[test]
    fn global_order_across_chunks() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("business.parquet");
        let schema = Arc::new(Schema::new(vec![Field::new("postal_code", DataType::Utf8, false)]));
        let chunk = |v: Vec<&str>| {
            RecordBatch::try_new(schema.clone(), vec![Arc::new(StringArray::from(v))]).unwrap()
        };

        let mut writer = ColumnarWriter::create(&path, schema.clone(), append_properties()).unwrap();
        writer.append(&chunk(vec!["3", "5"])).unwrap();
        writer.append(&chunk(vec!["1", "4"])).unwrap();
        writer.finish().unwrap();

        assert_eq!(rematerialize(&path, &["postal_code"]).unwrap(), 4);

        let batches = read_all(&path).unwrap();
        let values: Vec<String> = batches
            .iter()
            .flat_map(|b| {
                let a = b.column(0).as_any().downcast_ref::<StringArray>().unwrap();
                (0..a.len()).map(|i| a.value(i).to_string()).collect::<Vec<_>>()
            })
            .collect();
        assert_eq!(values, vec!["1", "3", "4", "5"]);
    }
}
