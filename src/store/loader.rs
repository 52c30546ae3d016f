//! Bulk load of columnar files into the transactional store
//!
//! Each table is loaded in one transaction from fixed-size batches. Date
//! columns are stored as `YYYY-MM-DD` text.

use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use arrow::array::{Array, ArrayRef, BooleanArray, Float64Array, Int64Array, StringArray};
use arrow::compute::cast;
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use itertools::Itertools;
use rusqlite::types::Value;
use rusqlite::{Connection, params_from_iter};
use serde::Serialize;

use crate::columnar::open_batches;
use crate::error::{PipelineError, Result};
use crate::filter::GlobalDedup;
use crate::schema::EntityKind;
use crate::utils::logging::{log_operation_complete, log_operation_start};

/// Outcome of loading one table
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableLoad {
    pub entity: EntityKind,
    /// Rows read from the columnar file
    pub rows_read: usize,
    /// Rows present in the table afterwards
    pub rows_inserted: usize,
    /// Rows suppressed as duplicates of an earlier key
    pub duplicates: usize,
}

/// Cast every `Date32` column to `YYYY-MM-DD` text
pub fn textualize_dates(batch: &RecordBatch) -> Result<RecordBatch> {
    if !batch
        .schema()
        .fields()
        .iter()
        .any(|f| f.data_type() == &DataType::Date32)
    {
        return Ok(batch.clone());
    }

    let mut fields = Vec::with_capacity(batch.num_columns());
    let mut columns: Vec<ArrayRef> = Vec::with_capacity(batch.num_columns());
    for (field, column) in batch.schema().fields().iter().zip(batch.columns()) {
        if field.data_type() == &DataType::Date32 {
            fields.push(Field::new(field.name(), DataType::Utf8, field.is_nullable()));
            columns.push(cast(column, &DataType::Utf8)?);
        } else {
            fields.push(field.as_ref().clone());
            columns.push(Arc::clone(column));
        }
    }
    Ok(RecordBatch::try_new(Arc::new(Schema::new(fields)), columns)?)
}

/// SQLite value of one cell
fn cell(column: &ArrayRef, row: usize) -> Result<Value> {
    if column.is_null(row) {
        return Ok(Value::Null);
    }
    let any = column.as_any();
    let value = match column.data_type() {
        DataType::Utf8 => any
            .downcast_ref::<StringArray>()
            .map(|a| Value::Text(a.value(row).to_string())),
        DataType::Float64 => any
            .downcast_ref::<Float64Array>()
            .map(|a| Value::Real(a.value(row))),
        DataType::Int64 => any
            .downcast_ref::<Int64Array>()
            .map(|a| Value::Integer(a.value(row))),
        DataType::Boolean => any
            .downcast_ref::<BooleanArray>()
            .map(|a| Value::Integer(i64::from(a.value(row)))),
        _ => None,
    };
    value.ok_or_else(|| {
        PipelineError::column(
            format!("<column of type {}>", column.data_type()),
            "unsupported type for the transactional store",
        )
    })
}

fn insert_sql(kind: EntityKind, columns: &[String]) -> String {
    // duplicate establishments keep the row inserted first
    let verb = match kind {
        EntityKind::Branch => "INSERT OR IGNORE",
        EntityKind::Company | EntityKind::Partner => "INSERT",
    };
    format!(
        "{verb} INTO {} ({}) VALUES ({})",
        kind.table_name(),
        columns.join(", "),
        (1..=columns.len()).map(|i| format!("?{i}")).join(", ")
    )
}

/// Loads columnar files into tables created by [`crate::store::schema`]
#[derive(Debug, Clone, Copy)]
pub struct BulkLoader {
    pub batch_size: usize,
}

impl BulkLoader {
    #[must_use]
    pub const fn new(batch_size: usize) -> Self {
        Self { batch_size }
    }

    /// Key set used to drop duplicates across batches, if the entity needs one
    ///
    /// Companies are unique by identifier and partners by the full row;
    /// establishments rely on their primary key.
    #[must_use]
    pub fn dedup_for(kind: EntityKind) -> Option<GlobalDedup> {
        match kind {
            EntityKind::Company | EntityKind::Partner => Some(GlobalDedup::new(kind.key_columns())),
            EntityKind::Branch => None,
        }
    }

    /// Load one entity's columnar file in a single transaction
    pub fn load_table(&self, conn: &mut Connection, kind: EntityKind, parquet: &Path) -> Result<TableLoad> {
        log_operation_start(&format!("Loading {} from", kind.table_name()), parquet);
        let start = Instant::now();
        let mut dedup = Self::dedup_for(kind);
        let mut rows_read = 0usize;
        let mut sql: Option<String> = None;

        let tx = conn.transaction()?;
        for batch in open_batches(parquet, self.batch_size, None)? {
            let batch = batch?;
            rows_read += batch.num_rows();
            let batch = match dedup.as_mut() {
                Some(dedup) => dedup.retain_unseen(&batch)?,
                None => batch,
            };
            if batch.num_rows() == 0 {
                continue;
            }
            let batch = textualize_dates(&batch)?;

            let sql = sql.get_or_insert_with(|| {
                let names: Vec<String> = batch
                    .schema()
                    .fields()
                    .iter()
                    .map(|f| f.name().clone())
                    .collect();
                insert_sql(kind, &names)
            });
            let mut stmt = tx.prepare_cached(sql)?;
            for row in 0..batch.num_rows() {
                let values = batch
                    .columns()
                    .iter()
                    .map(|column| cell(column, row))
                    .collect::<Result<Vec<_>>>()?;
                stmt.execute(params_from_iter(values))?;
            }
        }
        tx.commit()?;

        let rows_inserted: i64 = conn.query_row(
            &format!("SELECT COUNT(*) FROM {}", kind.table_name()),
            [],
            |r| r.get(0),
        )?;
        let rows_inserted = usize::try_from(rows_inserted).unwrap_or_default();
        let load = TableLoad {
            entity: kind,
            rows_read,
            rows_inserted,
            duplicates: rows_read.saturating_sub(rows_inserted),
        };
        log_operation_complete("loaded", parquet, rows_inserted, Some(start.elapsed()));
        if load.duplicates > 0 {
            log::info!("{}: {} duplicate rows suppressed", kind.table_name(), load.duplicates);
        }
        Ok(load)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::Date32Array;

    #[test]
    fn dates_become_iso_text() {
        let schema = Arc::new(Schema::new(vec![
            Field::new("d", DataType::Date32, true),
            Field::new("s", DataType::Utf8, true),
        ]));
        let batch = RecordBatch::try_new(
            schema,
            vec![
                Arc::new(Date32Array::from(vec![Some(18276), None])),
                Arc::new(StringArray::from(vec!["a", "b"])),
            ],
        )
        .unwrap();
        let out = textualize_dates(&batch).unwrap();
        let dates = out.column(0).as_any().downcast_ref::<StringArray>().unwrap();
        assert_eq!(dates.value(0), "2020-01-15");
        assert!(dates.is_null(1));
        assert_eq!(cell(out.column(1), 1).unwrap(), Value::Text("b".into()));
        assert_eq!(cell(out.column(0), 1).unwrap(), Value::Null);
    }

    #[test]
    fn insert_statement() {
        let cols = vec!["root_id".to_string(), "partner_name".to_string()];
        assert_eq!(
            insert_sql(EntityKind::Partner, &cols),
            "INSERT INTO partners (root_id, partner_name) VALUES (?1, ?2)"
        );
        assert!(insert_sql(EntityKind::Branch, &cols).starts_with("INSERT OR IGNORE INTO business"));
    }
}
