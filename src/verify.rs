//! Round-trip sample verification
//!
//! Random rows of a finished columnar file are traced back to the raw files
//! they came from and forward to the transactional store, by key columns.

use std::collections::BTreeSet;
use std::path::Path;

use arrow::array::{Array, ArrayRef};
use arrow::record_batch::RecordBatch;
use arrow::util::display::array_value_to_string;
use rand::Rng;
use rusqlite::Connection;
use rusqlite::types::Value;
use serde::Serialize;

use crate::columnar::{open_batches, row_count};
use crate::columnar::reader::DEFAULT_BATCH_SIZE;
use crate::config::PipelineConfig;
use crate::error::{PipelineError, Result};
use crate::schema::EntityKind;
use crate::store::loader::textualize_dates;
use crate::transform::{RawChunkReader, normalizer_for};

/// Key column values of one row, `None` for null
pub type RowKey = Vec<Option<String>>;

/// Outcome of one sample check
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SampleReport {
    pub entity: EntityKind,
    pub sampled: usize,
    /// Sampled keys not found in any raw file
    pub missing_in_raw: Vec<RowKey>,
    /// Sampled keys matched by other than exactly one stored row, with the count
    pub store_mismatches: Vec<(RowKey, usize)>,
}

impl SampleReport {
    /// Every sampled row traced both ways
    #[must_use]
    pub fn is_consistent(&self) -> bool {
        self.missing_in_raw.is_empty() && self.store_mismatches.is_empty()
    }
}

fn key_arrays(batch: &RecordBatch, kind: EntityKind) -> Result<Vec<ArrayRef>> {
    kind.key_columns()
        .iter()
        .map(|name| {
            batch
                .column_by_name(name)
                .cloned()
                .ok_or_else(|| PipelineError::column(*name, "key column not found"))
        })
        .collect()
}

fn row_key(arrays: &[ArrayRef], row: usize) -> Result<RowKey> {
    arrays
        .iter()
        .map(|array| {
            if array.is_null(row) {
                Ok(None)
            } else {
                Ok(Some(array_value_to_string(array, row)?))
            }
        })
        .collect()
}

/// Keys of `amount` distinct random rows of a columnar file
pub fn sample_keys(path: &Path, kind: EntityKind, amount: usize, rng: &mut impl Rng) -> Result<Vec<RowKey>> {
    let total = row_count(path)?;
    let amount = amount.min(total);
    if amount == 0 {
        return Ok(Vec::new());
    }
    let wanted: BTreeSet<usize> = rand::seq::index::sample(rng, total, amount).into_iter().collect();

    let mut keys = Vec::with_capacity(amount);
    let mut offset = 0usize;
    for batch in open_batches(path, DEFAULT_BATCH_SIZE, Some(kind.key_columns()))? {
        let batch = textualize_dates(&batch?)?;
        let end = offset + batch.num_rows();
        let arrays = key_arrays(&batch, kind)?;
        for &row in wanted.range(offset..end) {
            keys.push(row_key(&arrays, row - offset)?);
        }
        offset = end;
        if keys.len() == amount {
            break;
        }
    }
    Ok(keys)
}

/// Keys among `keys` that no raw file of the entity produces
pub fn missing_in_raw(config: &PipelineConfig, kind: EntityKind, keys: &[RowKey]) -> Result<Vec<RowKey>> {
    let mut pending: BTreeSet<RowKey> = keys.iter().cloned().collect();
    let normalizer = normalizer_for(config.entity_schema(kind)?);

    'files: for input in config.raw_files(kind) {
        let reader = RawChunkReader::open(&input, normalizer.schema().clone(), config.chunk_size)?;
        for chunk in reader {
            let batch = textualize_dates(&normalizer.normalize(chunk?)?)?;
            let arrays = key_arrays(&batch, kind)?;
            for row in 0..batch.num_rows() {
                pending.remove(&row_key(&arrays, row)?);
            }
            if pending.is_empty() {
                break 'files;
            }
        }
    }
    Ok(pending.into_iter().collect())
}

/// Number of stored rows matching a key, nulls compared as equal
pub fn store_matches(conn: &Connection, kind: EntityKind, key: &RowKey) -> Result<usize> {
    let predicate = kind
        .key_columns()
        .iter()
        .enumerate()
        .map(|(i, column)| format!("{column} IS ?{}", i + 1))
        .collect::<Vec<_>>()
        .join(" AND ");
    let sql = format!("SELECT COUNT(*) FROM {} WHERE {predicate}", kind.table_name());
    let params: Vec<Value> = key
        .iter()
        .map(|v| v.clone().map_or(Value::Null, Value::Text))
        .collect();
    let n: i64 = conn.query_row(&sql, rusqlite::params_from_iter(params), |r| r.get(0))?;
    Ok(usize::try_from(n).unwrap_or_default())
}

/// Check `samples` random rows of one entity end to end
pub fn verify_entity(
    config: &PipelineConfig,
    conn: &Connection,
    kind: EntityKind,
    samples: usize,
    rng: &mut impl Rng,
) -> Result<SampleReport> {
    let keys = sample_keys(&config.parquet_path(kind), kind, samples, rng)?;
    let missing = missing_in_raw(config, kind, &keys)?;

    let mut store_mismatches = Vec::new();
    for key in &keys {
        let n = store_matches(conn, kind, key)?;
        if n != 1 {
            store_mismatches.push((key.clone(), n));
        }
    }

    let report = SampleReport {
        entity: kind,
        sampled: keys.len(),
        missing_in_raw: missing,
        store_mismatches,
    };
    if report.is_consistent() {
        log::info!("[verify] {kind}: {} sampled rows traced", report.sampled);
    } else {
        log::warn!(
            "[verify] {kind}: {} missing in raw files, {} store mismatches",
            report.missing_in_raw.len(),
            report.store_mismatches.len()
        );
    }
    Ok(report)
}

/// Check every entity against the configured store
pub fn verify_all(config: &PipelineConfig, samples: usize, rng: &mut impl Rng) -> Result<Vec<SampleReport>> {
    let conn = Connection::open_with_flags(
        &config.sqlite_path,
        rusqlite::OpenFlags::SQLITE_OPEN_READ_ONLY,
    )?;
    EntityKind::LOAD_ORDER
        .into_iter()
        .map(|kind| verify_entity(config, &conn, kind, samples, &mut *rng))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::EntitySchema;
    use crate::store::schema::create_schema;

    #[test]
    fn null_key_parts_match_stored_nulls() {
        let conn = Connection::open_in_memory().unwrap();
        create_schema(&conn, &[EntitySchema::for_entity(EntityKind::Partner)]).unwrap();
        conn.execute_batch(
            "INSERT INTO partners VALUES ('00000001', 'ANA', NULL);
             INSERT INTO partners VALUES ('00000001', 'ANA', '2020-01-01');",
        )
        .unwrap();

        let undated = vec![Some("00000001".to_string()), Some("ANA".to_string()), None];
        assert_eq!(store_matches(&conn, EntityKind::Partner, &undated).unwrap(), 1);

        let dated = vec![
            Some("00000001".to_string()),
            Some("ANA".to_string()),
            Some("2020-01-01".to_string()),
        ];
        assert_eq!(store_matches(&conn, EntityKind::Partner, &dated).unwrap(), 1);

        let absent = vec![Some("00000002".to_string()), Some("ANA".to_string()), None];
        assert_eq!(store_matches(&conn, EntityKind::Partner, &absent).unwrap(), 0);
    }

    #[test]
    fn consistency() {
        let mut report = SampleReport {
            entity: EntityKind::Company,
            sampled: 1,
            missing_in_raw: Vec::new(),
            store_mismatches: Vec::new(),
        };
        assert!(report.is_consistent());
        report.store_mismatches.push((vec![Some("00000001".into())], 0));
        assert!(!report.is_consistent());
    }
}
