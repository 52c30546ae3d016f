//! Consistency filters applied to normalized chunks
//!
//! The semi-join keeps companies and branches that have at least one partner;
//! the de-duplication filters enforce first-occurrence-wins on key columns.

pub mod core;
pub mod dedup;
pub mod root_id;

pub use core::{BatchFilter, FilterChain, filter_record_batch, string_column};
pub use dedup::{FirstOccurrenceFilter, GlobalDedup};
pub use root_id::{KeySet, RootIdFilter};
