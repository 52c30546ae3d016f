//! Transactional store (SQLite)
//!
//! The store is rebuilt from the columnar files into a `.partial` database and
//! moved into place only after every table is loaded and indexed, so a failed
//! load never publishes a partial store.

pub mod index;
pub mod loader;
pub mod query;
pub mod schema;

use std::fs;
use std::path::PathBuf;
use std::time::Instant;

use rusqlite::Connection;
use serde::Serialize;

use crate::config::PipelineConfig;
use crate::error::Result;
use crate::error::util::{ensure_directory, partial_path};
use crate::schema::EntityKind;
use crate::utils::logging::{log_operation_start, log_skip};

pub use index::{IndexReport, QueryTiming, build_indexes};
pub use loader::{BulkLoader, TableLoad};
pub use query::{NameHit, Store, anchored_prefix_query};

/// Outcome of the store stage
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StoreReport {
    pub path: PathBuf,
    /// Store already existed and was kept
    pub skipped: bool,
    pub tables: Vec<TableLoad>,
    pub index: IndexReport,
}

/// Connection settings for a one-shot bulk build
fn configure_for_load(conn: &Connection, enforce_foreign_keys: bool) -> Result<()> {
    conn.execute_batch(
        "PRAGMA journal_mode = MEMORY;
         PRAGMA synchronous = OFF;
         PRAGMA temp_store = MEMORY;
         PRAGMA cache_size = -262144;",
    )?;
    conn.pragma_update(None, "foreign_keys", enforce_foreign_keys)?;
    Ok(())
}

/// Load and index every table on an open connection
pub fn load_all(conn: &mut Connection, config: &PipelineConfig) -> Result<(Vec<TableLoad>, IndexReport)> {
    let schemas = EntityKind::LOAD_ORDER
        .into_iter()
        .map(|kind| config.entity_schema(kind))
        .collect::<Result<Vec<_>>>()?;
    schema::create_schema(conn, &schemas)?;

    let loader = BulkLoader::new(config.load_batch_size);
    let mut tables = Vec::with_capacity(schemas.len());
    for kind in EntityKind::LOAD_ORDER {
        tables.push(loader.load_table(conn, kind, &config.parquet_path(kind))?);
    }

    let index = build_indexes(conn)?;
    Ok((tables, index))
}

/// Build the transactional store, unless it exists and no rebuild is asked for
pub fn build_store(config: &PipelineConfig) -> Result<StoreReport> {
    let path = config.sqlite_path.clone();
    if path.exists() && !config.rebuild_store {
        log_skip("transactional store already exists", &path);
        return Ok(StoreReport {
            path,
            skipped: true,
            ..StoreReport::default()
        });
    }

    let start = Instant::now();
    if let Some(parent) = path.parent() {
        ensure_directory(parent)?;
    }
    let partial = partial_path(&path);
    if partial.exists() {
        fs::remove_file(&partial)?;
    }
    log_operation_start("Building transactional store", &path);

    let outcome = (|| -> Result<(Vec<TableLoad>, IndexReport)> {
        let mut conn = Connection::open(&partial)?;
        configure_for_load(&conn, config.enforce_foreign_keys)?;
        let loaded = load_all(&mut conn, config)?;
        conn.close().map_err(|(_, e)| e)?;
        Ok(loaded)
    })();

    let (tables, index) = match outcome {
        Ok(loaded) => loaded,
        Err(e) => {
            let _ = fs::remove_file(&partial);
            return Err(e);
        }
    };
    fs::rename(&partial, &path)?;

    log::info!(
        "Transactional store {} built in {:?}",
        path.display(),
        start.elapsed()
    );
    Ok(StoreReport {
        path,
        skipped: false,
        tables,
        index,
    })
}
