//! Secondary and inverted indexes, plus query latency diagnostics

use std::time::{Duration, Instant};

use rusqlite::Connection;
use serde::Serialize;

use crate::error::Result;
use crate::schema::EntityKind;
use crate::store::schema::fts_table;
use crate::utils::logging::log_timing;

/// B-tree indexes built after loading
pub const BTREE_INDEXES: [(&str, &str, &str); 5] = [
    ("idx_partners_start_date", "partners", "partnership_start"),
    ("idx_partners_root_id", "partners", "root_id"),
    ("idx_business_opening_closing", "business", "opening_date, closing_date"),
    ("idx_companies_display_name", "companies", "display_name"),
    ("idx_business_branch_name", "business", "branch_name"),
];

/// Latency of one diagnostic query
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QueryTiming {
    pub label: String,
    pub rows: usize,
    pub elapsed: Duration,
}

/// Diagnostic timings around index creation
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IndexReport {
    pub before: Vec<QueryTiming>,
    pub after: Vec<QueryTiming>,
}

/// Run `sql` to completion and measure it
pub fn time_query(conn: &Connection, label: &str, sql: &str) -> Result<QueryTiming> {
    let start = Instant::now();
    let mut stmt = conn.prepare(sql)?;
    let mut rows = stmt.query([])?;
    let mut count = 0usize;
    while rows.next()?.is_some() {
        count += 1;
    }
    let timing = QueryTiming {
        label: label.to_string(),
        rows: count,
        elapsed: start.elapsed(),
    };
    log_timing(label, timing.elapsed, timing.rows);
    Ok(timing)
}

const DATE_RANGE_QUERIES: [(&str, &str); 2] = [
    (
        "partners started in 2020",
        "SELECT rowid FROM partners WHERE partnership_start BETWEEN '2020-01-01' AND '2020-12-31'",
    ),
    (
        "business opened in 2020",
        "SELECT rowid FROM business WHERE opening_date BETWEEN '2020-01-01' AND '2020-12-31'",
    ),
];

/// Queries measured before any index exists
pub fn measure_before(conn: &Connection) -> Result<Vec<QueryTiming>> {
    let mut timings = DATE_RANGE_QUERIES
        .iter()
        .map(|(label, sql)| time_query(conn, label, sql))
        .collect::<Result<Vec<_>>>()?;
    timings.push(time_query(
        conn,
        "partner name prefix (LIKE)",
        "SELECT rowid FROM partners WHERE partner_name LIKE 'MARIA%'",
    )?);
    timings.push(time_query(
        conn,
        "company name prefix (LIKE)",
        "SELECT rowid FROM companies WHERE display_name LIKE 'BANCO%'",
    )?);
    Ok(timings)
}

/// The same date scans plus their inverted index equivalents
pub fn measure_after(conn: &Connection) -> Result<Vec<QueryTiming>> {
    let mut timings = DATE_RANGE_QUERIES
        .iter()
        .map(|(label, sql)| time_query(conn, label, sql))
        .collect::<Result<Vec<_>>>()?;
    timings.push(time_query(
        conn,
        "partner name prefix (MATCH)",
        "SELECT rowid FROM partners_fts WHERE partners_fts MATCH 'MARIA*'",
    )?);
    timings.push(time_query(
        conn,
        "company name prefix (MATCH)",
        "SELECT rowid FROM companies_fts WHERE companies_fts MATCH 'BANCO*'",
    )?);
    Ok(timings)
}

/// Create the B-tree indexes
pub fn create_btree_indexes(conn: &Connection) -> Result<()> {
    for (name, table, columns) in BTREE_INDEXES {
        let start = Instant::now();
        log::info!("Building index {name} on {table}({columns})");
        conn.execute_batch(&format!(
            "CREATE INDEX IF NOT EXISTS {name} ON {table}({columns})"
        ))?;
        log::info!("Index {name} built in {:?}", start.elapsed());
    }
    Ok(())
}

/// Create and populate the external-content inverted index of one entity
///
/// The index stores no copy of the text; its rowids point at the owning table.
pub fn create_fts_index(conn: &Connection, kind: EntityKind) -> Result<()> {
    let start = Instant::now();
    let fts = fts_table(kind);
    let table = kind.table_name();
    let column = kind.name_column();
    log::info!("Building inverted index {fts} over {table}.{column}");

    conn.execute_batch(&format!(
        "DROP TABLE IF EXISTS {fts};
         CREATE VIRTUAL TABLE {fts} USING fts5({column}, content='{table}', content_rowid='rowid');
         INSERT INTO {fts}(rowid, {column}) SELECT rowid, {column} FROM {table};"
    ))?;

    log::info!("Inverted index {fts} built in {:?}", start.elapsed());
    Ok(())
}

/// Build every index, timing representative queries before and after
pub fn build_indexes(conn: &Connection) -> Result<IndexReport> {
    let before = measure_before(conn)?;
    create_btree_indexes(conn)?;
    for kind in EntityKind::LOAD_ORDER {
        create_fts_index(conn, kind)?;
    }
    conn.execute_batch("ANALYZE")?;
    let after = measure_after(conn)?;
    Ok(IndexReport { before, after })
}
