//! Reading columnar files back
//!
//! Batches are streamed with an optional column projection so the loader and
//! the key-set reader never materialize more than one batch at a time.

use std::path::Path;

use arrow::record_batch::RecordBatch;
use parquet::arrow::ProjectionMask;
use parquet::arrow::arrow_reader::{ParquetRecordBatchReader, ParquetRecordBatchReaderBuilder};
use rustc_hash::FxHashSet;

use crate::error::util::safe_open_file;
use crate::error::{PipelineError, Result};
use crate::filter::string_column;

/// Default batch size for reading
pub const DEFAULT_BATCH_SIZE: usize = 16384;

/// Open a streaming batch reader
///
/// # Arguments
/// * `path` - Parquet file to read
/// * `batch_size` - Rows per yielded batch
/// * `columns` - Optional projection by column name
pub fn open_batches(
    path: &Path,
    batch_size: usize,
    columns: Option<&[&str]>,
) -> Result<ParquetRecordBatchReader> {
    let file = safe_open_file(path, "columnar read")?;
    let builder = ParquetRecordBatchReaderBuilder::try_new(file)?;

    let builder = match columns {
        Some(names) => {
            let indices = names
                .iter()
                .map(|name| {
                    builder
                        .schema()
                        .index_of(name)
                        .map_err(|_| PipelineError::column(*name, format!("not in {}", path.display())))
                })
                .collect::<Result<Vec<_>>>()?;
            let mask = ProjectionMask::roots(builder.parquet_schema(), indices);
            builder.with_projection(mask)
        }
        None => builder,
    };

    Ok(builder.with_batch_size(batch_size.max(1)).build()?)
}

/// Read a whole file into memory
pub fn read_all(path: &Path) -> Result<Vec<RecordBatch>> {
    open_batches(path, DEFAULT_BATCH_SIZE, None)?
        .map(|batch| batch.map_err(PipelineError::from))
        .collect()
}

/// Row count from the file footer
pub fn row_count(path: &Path) -> Result<usize> {
    let file = safe_open_file(path, "columnar metadata")?;
    let builder = ParquetRecordBatchReaderBuilder::try_new(file)?;
    let rows = builder.metadata().file_metadata().num_rows();
    Ok(usize::try_from(rows).unwrap_or_default())
}

/// Distinct non-null values of a Utf8 column
///
/// Used to build the semi-join reference set, so an absent file is reported
/// as [`PipelineError::MissingReferenceSet`].
pub fn read_key_set(path: &Path, column: &str) -> Result<FxHashSet<String>> {
    if !path.is_file() {
        return Err(PipelineError::MissingReferenceSet(path.to_path_buf()));
    }

    let mut keys = FxHashSet::default();
    for batch in open_batches(path, DEFAULT_BATCH_SIZE, Some(&[column]))? {
        let batch = batch?;
        let ids = string_column(&batch, column)?;
        keys.extend(
            ids.iter()
                .flatten()
                .map(str::to_string),
        );
    }
    Ok(keys)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use arrow::array::{Array, StringArray};
    use arrow::datatypes::{DataType, Field, Schema};

    use crate::columnar::writer::{ColumnarWriter, append_properties};

    #[test]
    fn key_set_and_projection() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("partners.parquet");
        let schema = Arc::new(Schema::new(vec![
            Field::new("root_id", DataType::Utf8, true),
            Field::new("partner_name", DataType::Utf8, true),
        ]));
        let batch = RecordBatch::try_new(
            schema.clone(),
            vec![
                Arc::new(StringArray::from(vec![Some("00000002"), Some("00000002"), None])),
                Arc::new(StringArray::from(vec!["A", "B", "C"])),
            ],
        )
        .unwrap();
        let mut writer = ColumnarWriter::create(&path, schema, append_properties()).unwrap();
        writer.append(&batch).unwrap();
        writer.finish().unwrap();

        let keys = read_key_set(&path, "root_id").unwrap();
        assert_eq!(keys.len(), 1);
        assert!(keys.contains("00000002"));

        let projected: Vec<RecordBatch> = open_batches(&path, 2, Some(&["partner_name"]))
            .unwrap()
            .collect::<std::result::Result<_, _>>()
            .unwrap();
        assert_eq!(projected[0].num_columns(), 1);
        assert_eq!(projected.iter().map(|b| b.num_rows()).sum::<usize>(), 3);
        assert_eq!(projected[0].column(0).len(), 2);
    }

    #[test]
    fn missing_reference_file() {
        let err = read_key_set(Path::new("/nope/partners.parquet"), "root_id").unwrap_err();
        assert!(matches!(err, PipelineError::MissingReferenceSet(_)));
    }
}
