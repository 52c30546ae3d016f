//! Analytic mirror (DuckDB) of the transactional store

pub mod mirror;

pub use mirror::{MirrorReport, copy_table, mirror, smoke_test};

use crate::config::PipelineConfig;
use crate::error::Result;
use crate::schema::EntityKind;

/// Rebuild the mirror configured for this run
pub fn build_mirror(config: &PipelineConfig) -> Result<MirrorReport> {
    let schemas = EntityKind::LOAD_ORDER
        .into_iter()
        .map(|kind| config.entity_schema(kind))
        .collect::<Result<Vec<_>>>()?;
    mirror(
        &config.sqlite_path,
        &config.duckdb_path,
        &schemas,
        config.vacuum_analytic,
    )
}
