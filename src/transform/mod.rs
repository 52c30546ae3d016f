//! Raw registry files to columnar files
//!
//! Partners are transformed first because their finished output is the
//! reference set for the company and branch semi-join.

pub mod normalize;
pub mod reader;
pub mod stage;

pub use normalize::{
    BranchNormalizer, ChunkNormalizer, CompanyNormalizer, PartnerNormalizer, normalizer_for,
};
pub use reader::{RawChunk, RawChunkReader, decode_latin1};
pub use stage::{CsvToColumnar, TransformReport, filters_for, transform_all, transform_entity};
