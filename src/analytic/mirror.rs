//! Copy of the transactional store into DuckDB
//!
//! Tables are read from SQLite opened read-only and appended row by row
//! through DuckDB's appender, replacing any table of the same name. Dates
//! stored as text are restored to `DATE` values.

use std::path::{Path, PathBuf};
use std::time::Instant;

use duckdb::types::Value as DuckValue;
use rusqlite::types::Value as SqlValue;
use rusqlite::{OpenFlags, params};
use serde::Serialize;

use crate::error::{PipelineError, Result};
use crate::error::util::ensure_directory;
use crate::schema::coerce::date_to_days;
use crate::schema::{Coercion, EntityKind, EntitySchema};
use crate::store::QueryTiming;
use crate::utils::logging::{log_operation_complete, log_operation_start, log_timing};

/// DuckDB column type for a coercion
#[must_use]
pub const fn duck_type(coercion: Coercion) -> &'static str {
    match coercion {
        Coercion::Capital => "DOUBLE",
        Coercion::Flag { .. } => "BOOLEAN",
        Coercion::CompactDate => "DATE",
        Coercion::Text | Coercion::ZeroPad { .. } | Coercion::PostalCode { .. } => "VARCHAR",
    }
}

/// `CREATE TABLE` statement of the mirrored table
#[must_use]
pub fn create_table_sql(schema: &EntitySchema) -> String {
    let columns: Vec<String> = schema
        .fields
        .iter()
        .map(|f| format!("{} {}", f.name, duck_type(f.coercion)))
        .collect();
    format!(
        "CREATE TABLE {} ({})",
        schema.kind.table_name(),
        columns.join(", ")
    )
}

/// Outcome of the mirror stage
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MirrorReport {
    pub path: PathBuf,
    /// Rows copied per table
    pub tables: Vec<(EntityKind, usize)>,
    /// Aggregate smoke queries run after copying
    pub smoke: Vec<QueryTiming>,
    pub vacuumed: bool,
}

/// Convert one SQLite cell into the DuckDB value of the target column
fn convert(value: SqlValue, coercion: Coercion) -> Result<DuckValue> {
    Ok(match (value, coercion) {
        (SqlValue::Null, _) => DuckValue::Null,
        (SqlValue::Text(text), Coercion::CompactDate) => {
            let date = chrono::NaiveDate::parse_from_str(&text, "%Y-%m-%d").map_err(|e| {
                PipelineError::column("<date>", format!("'{text}' is not an ISO date: {e}"))
            })?;
            DuckValue::Date32(date_to_days(date))
        }
        (SqlValue::Integer(i), Coercion::Flag { .. }) => DuckValue::Boolean(i != 0),
        (SqlValue::Integer(i), Coercion::Capital) => DuckValue::Double(i as f64),
        (SqlValue::Real(r), _) => DuckValue::Double(r),
        (SqlValue::Text(text), _) => DuckValue::Text(text),
        (SqlValue::Integer(i), _) => DuckValue::BigInt(i),
        (SqlValue::Blob(b), _) => DuckValue::Blob(b),
    })
}

/// Copy one table
pub fn copy_table(
    source: &rusqlite::Connection,
    target: &duckdb::Connection,
    schema: &EntitySchema,
) -> Result<usize> {
    let table = schema.kind.table_name();
    target.execute_batch(&format!(
        "DROP TABLE IF EXISTS {table}; {}",
        create_table_sql(schema)
    ))?;

    let names: Vec<&str> = schema.fields.iter().map(|f| f.name).collect();
    let mut stmt = source.prepare(&format!("SELECT {} FROM {table}", names.join(", ")))?;
    let mut rows = stmt.query(params![])?;
    let mut appender = target.appender(table)?;
    let mut copied = 0usize;

    while let Some(row) = rows.next()? {
        let values = schema
            .fields
            .iter()
            .enumerate()
            .map(|(i, field)| convert(row.get::<_, SqlValue>(i)?, field.coercion))
            .collect::<Result<Vec<_>>>()?;
        appender.append_row(duckdb::appender_params_from_iter(values))?;
        copied += 1;
    }
    appender.flush()?;
    Ok(copied)
}

const SMOKE_QUERIES: [(&str, &str); 4] = [
    ("row counts", "SELECT (SELECT COUNT(*) FROM companies), (SELECT COUNT(*) FROM partners), (SELECT COUNT(*) FROM business)"),
    ("capital min/max/avg", "SELECT MIN(capital_value), MAX(capital_value), AVG(capital_value) FROM companies"),
    ("partnership start range", "SELECT MIN(partnership_start), MAX(partnership_start) FROM partners"),
    ("opening and closing range", "SELECT MIN(opening_date), MAX(opening_date), MIN(closing_date), MAX(closing_date) FROM business"),
];

/// Run the aggregate smoke queries
pub fn smoke_test(conn: &duckdb::Connection) -> Result<Vec<QueryTiming>> {
    SMOKE_QUERIES
        .iter()
        .map(|(label, sql)| {
            let start = Instant::now();
            let mut stmt = conn.prepare(sql)?;
            let mut rows = stmt.query([])?;
            let mut count = 0usize;
            while rows.next()?.is_some() {
                count += 1;
            }
            let timing = QueryTiming {
                label: (*label).to_string(),
                rows: count,
                elapsed: start.elapsed(),
            };
            log_timing(label, timing.elapsed, timing.rows);
            Ok(timing)
        })
        .collect()
}

/// Rebuild the analytic mirror from the transactional store
pub fn mirror(
    sqlite_path: &Path,
    duckdb_path: &Path,
    schemas: &[EntitySchema],
    vacuum: bool,
) -> Result<MirrorReport> {
    log_operation_start("Mirroring into analytic store", duckdb_path);
    let start = Instant::now();

    let source = rusqlite::Connection::open_with_flags(
        sqlite_path,
        OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
    )?;
    if let Some(parent) = duckdb_path.parent() {
        ensure_directory(parent)?;
    }
    let target = duckdb::Connection::open(duckdb_path)?;

    let mut report = MirrorReport {
        path: duckdb_path.to_path_buf(),
        ..MirrorReport::default()
    };
    for kind in EntityKind::LOAD_ORDER {
        if let Some(schema) = schemas.iter().find(|s| s.kind == kind) {
            let table_start = Instant::now();
            let copied = copy_table(&source, &target, schema)?;
            log::info!(
                "Mirrored {copied} rows of {} in {:?}",
                kind.table_name(),
                table_start.elapsed()
            );
            report.tables.push((kind, copied));
        }
    }

    report.smoke = smoke_test(&target)?;
    if vacuum {
        target.execute_batch("VACUUM ANALYZE; CHECKPOINT;")?;
        report.vacuumed = true;
    }

    let total = report.tables.iter().map(|(_, n)| n).sum();
    log_operation_complete("mirrored", sqlite_path, total, Some(start.elapsed()));
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partner_ddl() {
        let sql = create_table_sql(&EntitySchema::for_entity(EntityKind::Partner));
        assert_eq!(
            sql,
            "CREATE TABLE partners (root_id VARCHAR, partner_name VARCHAR, partnership_start DATE)"
        );
    }

    #[test]
    fn value_conversion() {
        assert_eq!(
            convert(SqlValue::Text("2020-01-15".into()), Coercion::CompactDate).unwrap(),
            DuckValue::Date32(18276)
        );
        assert_eq!(
            convert(SqlValue::Integer(1), Coercion::Flag { sentinel: "1" }).unwrap(),
            DuckValue::Boolean(true)
        );
        assert_eq!(
            convert(SqlValue::Null, Coercion::Text).unwrap(),
            DuckValue::Null
        );
        assert!(convert(SqlValue::Text("15/01/2020".into()), Coercion::CompactDate).is_err());
    }
}
