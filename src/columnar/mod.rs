//! Columnar (Parquet) storage of the normalized entities

pub mod reader;
pub mod rematerialize;
pub mod sort;
pub mod writer;

pub use reader::{open_batches, read_all, read_key_set, row_count};
pub use rematerialize::rematerialize;
pub use sort::sort_batch;
pub use writer::{ColumnarWriter, append_properties, compact_properties};
