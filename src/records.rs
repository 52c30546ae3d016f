//! Typed rows of the three entities
//!
//! Used by point lookups against the transactional store and to deserialize
//! columnar batches with `serde_arrow`.

use arrow::record_batch::RecordBatch;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, Result};

/// Company level record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompanyRecord {
    pub root_id: String,
    pub display_name: Option<String>,
    pub capital_value: Option<f64>,
}

/// Establishment of a company
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BranchRecord {
    pub root_id: String,
    pub branch_order: String,
    pub check_digit: String,
    pub is_headquarters: bool,
    pub branch_name: Option<String>,
    pub closing_date: Option<NaiveDate>,
    pub opening_date: Option<NaiveDate>,
    pub postal_code: String,
}

impl BranchRecord {
    /// Full 14-digit registry number of the establishment, without check formatting
    #[must_use]
    pub fn full_id(&self) -> String {
        format!("{}{}{}", self.root_id, self.branch_order, self.check_digit)
    }
}

/// Partnership relation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartnerRecord {
    pub root_id: String,
    pub partner_name: String,
    pub partnership_start: Option<NaiveDate>,
}

/// Deserialize a columnar batch into typed records
pub fn from_batch<T>(batch: &RecordBatch) -> Result<Vec<T>>
where
    T: for<'de> Deserialize<'de>,
{
    serde_arrow::from_record_batch::<Vec<T>>(batch)
        .map_err(|e| PipelineError::column("<batch>", format!("failed to deserialize: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use arrow::array::{Date32Array, StringArray};
    use arrow::datatypes::{DataType, Field, Schema};

    use crate::schema::coerce::date_to_days;

    #[test]
    fn partner_batch_to_records() {
        let schema = Arc::new(Schema::new(vec![
            Field::new("root_id", DataType::Utf8, true),
            Field::new("partner_name", DataType::Utf8, true),
            Field::new("partnership_start", DataType::Date32, true),
        ]));
        let date = NaiveDate::from_ymd_opt(2020, 1, 15).unwrap();
        let batch = RecordBatch::try_new(
            schema,
            vec![
                Arc::new(StringArray::from(vec!["00000002", "00000003"])),
                Arc::new(StringArray::from(vec!["MARIA SILVA", "JOAO"])),
                Arc::new(Date32Array::from(vec![Some(date_to_days(date)), None])),
            ],
        )
        .unwrap();

        let records: Vec<PartnerRecord> = from_batch(&batch).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].partnership_start, Some(date));
        assert_eq!(records[1].partnership_start, None);
        assert_eq!(records[1].partner_name, "JOAO");
    }

    #[test]
    fn branch_full_id() {
        let branch = BranchRecord {
            root_id: "00000002".into(),
            branch_order: "0001".into(),
            check_digit: "07".into(),
            is_headquarters: true,
            branch_name: None,
            closing_date: None,
            opening_date: None,
            postal_code: "00000000".into(),
        };
        assert_eq!(branch.full_id(), "00000002000107");
    }
}
