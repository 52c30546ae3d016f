//! Semi-join on the root identifier
//!
//! Keeps only rows whose `root_id` is a member of a reference key set, which
//! is read from the finished partner columnar file before companies and
//! branches are transformed.

use std::collections::HashSet;
use std::sync::Arc;

use arrow::array::{Array, BooleanArray, StringArray};
use arrow::record_batch::RecordBatch;
use rayon::prelude::*;
use rustc_hash::FxHashSet;

use crate::error::Result;
use crate::filter::core::{BatchFilter, filter_record_batch, string_column};
use crate::schema::ROOT_ID;

/// Arrays at least this long are checked in parallel
const PARALLEL_THRESHOLD: usize = 1 << 16;

/// Set of root identifiers shared between filters
pub type KeySet = Arc<FxHashSet<String>>;

/// A filter that includes only rows whose key is in the reference set
#[derive(Debug, Clone)]
pub struct RootIdFilter {
    keys: KeySet,
    column: String,
}

impl RootIdFilter {
    /// Create a filter over the `root_id` column
    #[must_use]
    pub fn new(keys: KeySet) -> Self {
        Self {
            keys,
            column: ROOT_ID.to_string(),
        }
    }

    /// Membership mask; null keys never match
    #[must_use]
    pub fn mask(&self, ids: &StringArray) -> BooleanArray {
        let member = |i: usize| !ids.is_null(i) && self.keys.contains(ids.value(i));
        let values: Vec<bool> = if ids.len() >= PARALLEL_THRESHOLD {
            (0..ids.len()).into_par_iter().map(member).collect()
        } else {
            (0..ids.len()).map(member).collect()
        };
        BooleanArray::from(values)
    }
}

impl BatchFilter for RootIdFilter {
    fn filter(&self, batch: &RecordBatch) -> Result<RecordBatch> {
        let ids = string_column(batch, &self.column)?;
        let mask = self.mask(ids);
        filter_record_batch(batch, &mask)
    }

    fn required_columns(&self) -> HashSet<String> {
        HashSet::from([self.column.clone()])
    }
}
