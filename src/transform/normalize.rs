//! Per-entity normalization strategies
//!
//! A [`ChunkNormalizer`] turns a [`RawChunk`] into a typed record batch.
//! Every entity shares the column coercion step; what differs is which
//! incomplete rows are dropped afterwards.

use arrow::array::{ArrayRef, BooleanArray};
use arrow::compute::{and, is_not_null};
use arrow::record_batch::RecordBatch;
use rayon::prelude::*;

use crate::error::{PipelineError, Result};
use crate::filter::filter_record_batch;
use crate::schema::coerce::coerce_column;
use crate::schema::{EntityKind, EntitySchema, ROOT_ID};
use crate::transform::reader::RawChunk;

/// Converts raw chunks of one entity into typed batches
pub trait ChunkNormalizer: Send + Sync {
    /// Projection plan used by this normalizer
    fn schema(&self) -> &EntitySchema;

    /// Produce the typed batch for one chunk
    fn normalize(&self, chunk: RawChunk) -> Result<RecordBatch>;

    /// Entity handled
    fn kind(&self) -> EntityKind {
        self.schema().kind
    }
}

/// Apply every field's coercion, one column per rayon task
pub fn coerce_chunk(schema: &EntitySchema, chunk: &RawChunk) -> Result<RecordBatch> {
    if chunk.columns.len() != schema.fields.len() {
        return Err(PipelineError::column(
            schema.kind.table_name(),
            format!(
                "chunk has {} columns, schema has {}",
                chunk.columns.len(),
                schema.fields.len()
            ),
        ));
    }

    let columns: Vec<ArrayRef> = schema
        .fields
        .par_iter()
        .zip(chunk.columns.par_iter())
        .map(|(field, values)| coerce_column(values, field.coercion))
        .collect();

    Ok(RecordBatch::try_new(schema.arrow_schema(), columns)?)
}

/// Drop rows where any of `columns` is null
pub fn drop_incomplete(batch: &RecordBatch, columns: &[&str]) -> Result<RecordBatch> {
    let mut mask: Option<BooleanArray> = None;
    for name in columns {
        let column = batch
            .column_by_name(name)
            .ok_or_else(|| PipelineError::column(*name, "required column not found"))?;
        let present = is_not_null(column.as_ref())?;
        mask = Some(match mask {
            Some(previous) => and(&previous, &present)?,
            None => present,
        });
    }

    match mask {
        Some(mask) => filter_record_batch(batch, &mask),
        None => Ok(batch.clone()),
    }
}

/// Company records: the root identifier must be present
#[derive(Debug, Clone)]
pub struct CompanyNormalizer {
    schema: EntitySchema,
}

impl ChunkNormalizer for CompanyNormalizer {
    fn schema(&self) -> &EntitySchema {
        &self.schema
    }

    fn normalize(&self, chunk: RawChunk) -> Result<RecordBatch> {
        let batch = coerce_chunk(&self.schema, &chunk)?;
        drop_incomplete(&batch, &[ROOT_ID])
    }
}

/// Establishments: every part of the composite key must be present
#[derive(Debug, Clone)]
pub struct BranchNormalizer {
    schema: EntitySchema,
}

impl ChunkNormalizer for BranchNormalizer {
    fn schema(&self) -> &EntitySchema {
        &self.schema
    }

    fn normalize(&self, chunk: RawChunk) -> Result<RecordBatch> {
        let batch = coerce_chunk(&self.schema, &chunk)?;
        drop_incomplete(&batch, EntityKind::Branch.key_columns())
    }
}

/// Rows where every raw value is non-blank
///
/// Runs before coercion: a blank value and one that fails to parse are
/// different things, and only the blank one marks a row as incomplete.
#[must_use]
pub fn raw_complete_mask(chunk: &RawChunk) -> BooleanArray {
    (0..chunk.rows)
        .map(|row| {
            Some(
                chunk
                    .columns
                    .iter()
                    .all(|column| column.get(row).is_some_and(|v| !v.trim().is_empty())),
            )
        })
        .collect()
}

/// Partnerships: rows with any blank raw field are dropped
///
/// A start date that is present but unparseable (`"0"`, `"00000000"`) stays
/// as a null date.
#[derive(Debug, Clone)]
pub struct PartnerNormalizer {
    schema: EntitySchema,
}

impl ChunkNormalizer for PartnerNormalizer {
    fn schema(&self) -> &EntitySchema {
        &self.schema
    }

    fn normalize(&self, chunk: RawChunk) -> Result<RecordBatch> {
        let complete = raw_complete_mask(&chunk);
        let batch = coerce_chunk(&self.schema, &chunk)?;
        filter_record_batch(&batch, &complete)
    }
}

/// Pick the normalizer for the entity described by `schema`
#[must_use]
pub fn normalizer_for(schema: EntitySchema) -> Box<dyn ChunkNormalizer> {
    match schema.kind {
        EntityKind::Company => Box::new(CompanyNormalizer { schema }),
        EntityKind::Branch => Box::new(BranchNormalizer { schema }),
        EntityKind::Partner => Box::new(PartnerNormalizer { schema }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::{Array, BooleanArray, Date32Array, Float64Array, StringArray};
    use chrono::NaiveDate;

    fn chunk(columns: Vec<Vec<&str>>) -> RawChunk {
        let rows = columns.first().map_or(0, Vec::len);
        RawChunk {
            columns: columns
                .into_iter()
                .map(|c| c.into_iter().map(String::from).collect())
                .collect(),
            rows,
        }
    }

    fn strings(batch: &RecordBatch, name: &str) -> Vec<Option<String>> {
        let a = batch
            .column_by_name(name)
            .unwrap()
            .as_any()
            .downcast_ref::<StringArray>()
            .unwrap();
        a.iter().map(|v| v.map(String::from)).collect()
    }

    #[test]
    fn company_values() {
        let normalizer = normalizer_for(EntitySchema::for_entity(EntityKind::Company));
        let batch = normalizer
            .normalize(chunk(vec![
                vec!["1", "", "33"],
                vec!["ACME LTDA", "NO ID", ""],
                vec!["1.234,56", "0,00", "x"],
            ]))
            .unwrap();

        // the row with an empty identifier is gone
        assert_eq!(batch.num_rows(), 2);
        assert_eq!(
            strings(&batch, ROOT_ID),
            vec![Some("00000001".into()), Some("00000033".into())]
        );
        assert_eq!(strings(&batch, "display_name")[1], None);
        let capital = batch
            .column_by_name("capital_value")
            .unwrap()
            .as_any()
            .downcast_ref::<Float64Array>()
            .unwrap();
        assert!((capital.value(0) - 1234.56).abs() < 1e-9);
        assert!(capital.is_null(1));
    }

    #[test]
    fn branch_values() {
        let normalizer = normalizer_for(EntitySchema::for_entity(EntityKind::Branch));
        let batch = normalizer
            .normalize(chunk(vec![
                vec!["2"],
                vec!["1"],
                vec!["7"],
                vec!["1"],
                vec!["LOJA"],
                vec!["00000000"],
                vec!["20200115"],
                vec!["01310-100"],
            ]))
            .unwrap();

        assert_eq!(strings(&batch, "branch_order"), vec![Some("0001".into())]);
        assert_eq!(strings(&batch, "check_digit"), vec![Some("07".into())]);
        assert_eq!(strings(&batch, "postal_code"), vec![Some("01310100".into())]);
        let hq = batch
            .column_by_name("is_headquarters")
            .unwrap()
            .as_any()
            .downcast_ref::<BooleanArray>()
            .unwrap();
        assert!(hq.value(0));
        let closing = batch
            .column_by_name("closing_date")
            .unwrap()
            .as_any()
            .downcast_ref::<Date32Array>()
            .unwrap();
        assert!(closing.is_null(0));
        let opening = batch
            .column_by_name("opening_date")
            .unwrap()
            .as_any()
            .downcast_ref::<Date32Array>()
            .unwrap();
        assert_eq!(opening.value_as_date(0), NaiveDate::from_ymd_opt(2020, 1, 15));
    }

    #[test]
    fn incomplete_partners_are_dropped() {
        let normalizer = normalizer_for(EntitySchema::for_entity(EntityKind::Partner));
        assert_eq!(normalizer.kind(), EntityKind::Partner);
        let batch = normalizer
            .normalize(chunk(vec![
                vec!["2", "", "3"],
                vec!["MARIA SILVA", "JOAO", ""],
                vec!["20200115", "20200115", "20200115"],
            ]))
            .unwrap();
        assert_eq!(batch.num_rows(), 1);
        assert_eq!(
            strings(&batch, "partner_name"),
            vec![Some("MARIA SILVA".into())]
        );
    }

    #[test]
    fn blank_start_date_drops_the_partner() {
        let normalizer = normalizer_for(EntitySchema::for_entity(EntityKind::Partner));
        let batch = normalizer
            .normalize(chunk(vec![
                vec!["2", "3", "4"],
                vec!["ANA", "BIA", "CAIO"],
                vec!["", "00000000", " "],
            ]))
            .unwrap();
        assert_eq!(batch.num_rows(), 1);
        assert_eq!(strings(&batch, "partner_name"), vec![Some("BIA".into())]);
        let starts = batch
            .column_by_name("partnership_start")
            .unwrap()
            .as_any()
            .downcast_ref::<Date32Array>()
            .unwrap();
        assert!(starts.is_null(0));
    }

    #[test]
    fn column_count_mismatch() {
        let schema = EntitySchema::for_entity(EntityKind::Partner);
        assert!(coerce_chunk(&schema, &chunk(vec![vec!["1"]])).is_err());
    }
}
