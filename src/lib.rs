//! ETL pipeline for the national business registry dumps.
//!
//! Raw archives are downloaded and extracted, normalized into Parquet files,
//! bulk loaded into an indexed SQLite store, mirrored into DuckDB for
//! aggregate statistics and exported as a partner graph.

pub mod analytic;
pub mod columnar;
pub mod config;
pub mod error;
pub mod filter;
pub mod graph;
pub mod ingest;
pub mod pipeline;
pub mod records;
pub mod schema;
pub mod stats;
pub mod store;
pub mod transform;
pub mod utils;
pub mod verify;

// Re-export the most common types for easier use
// Core types
pub use config::PipelineConfig;
pub use error::{PipelineError, Result};
pub use schema::{EntityKind, EntitySchema};

// Arrow types
pub use arrow::datatypes::Schema as ArrowSchema;
pub use arrow::record_batch::RecordBatch;

// Stages
pub use analytic::{MirrorReport, build_mirror};
pub use graph::{GraphReport, build_graph};
pub use ingest::{IngestReport, ingest};
pub use pipeline::{RunReport, run_all};
pub use store::{Store, StoreReport, build_store};
pub use transform::{TransformReport, transform_all, transform_entity};

// Read paths
pub use records::{BranchRecord, CompanyRecord, PartnerRecord};
pub use stats::{Statistics, StatsFacade};
pub use verify::{SampleReport, verify_all};
