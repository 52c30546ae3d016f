//! Partner graph as bulk-import CSV files
//!
//! Three files are written: `companies.csv` and `partners.csv` hold the nodes,
//! `partner_of.csv` holds one `PARTNER_OF` edge per partner and company. The
//! headers follow the `neo4j-admin database import` conventions, so the
//! directory can be imported as is.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use csv::Writer;
use rusqlite::{Connection, OpenFlags};
use serde::Serialize;

use crate::error::Result;
use crate::error::util::{ensure_directory, partial_path};
use crate::utils::logging::{log_operation_complete, log_operation_start};

pub const COMPANY_NODES: &str = "companies.csv";
pub const PARTNER_NODES: &str = "partners.csv";
pub const PARTNER_OF_EDGES: &str = "partner_of.csv";

const COMPANY_LABEL: &str = "Company";
const PARTNER_LABEL: &str = "Partner";
const PARTNER_OF: &str = "PARTNER_OF";

/// Outcome of the graph export
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct GraphReport {
    pub path: PathBuf,
    /// Export already existed and was kept
    pub skipped: bool,
    pub companies: usize,
    pub partners: usize,
    pub edges: usize,
}

/// Write the rows of `sql` to `path` below `header`, returning the row count
fn write_rows(
    conn: &Connection,
    path: &Path,
    header: &[&str],
    sql: &str,
    mut record: impl FnMut(&rusqlite::Row<'_>) -> rusqlite::Result<Vec<String>>,
) -> Result<usize> {
    let mut writer = Writer::from_path(path)?;
    writer.write_record(header)?;

    let mut stmt = conn.prepare(sql)?;
    let mut rows = stmt.query([])?;
    let mut count = 0;
    while let Some(row) = rows.next()? {
        writer.write_record(record(row)?)?;
        count += 1;
    }
    writer.flush()?;
    Ok(count)
}

/// Export the partner graph held by the store at `sqlite_path` into `dir`
///
/// Company nodes are keyed by root identifier and partner nodes by name.
/// Repeated partner rows collapse into a single edge dated with the earliest
/// known start date; an edge whose rows carry no date has none.
pub fn export_partner_graph(sqlite_path: &Path, dir: &Path) -> Result<GraphReport> {
    log_operation_start("Exporting partner graph to", dir);
    let start = Instant::now();

    let conn = Connection::open_with_flags(
        sqlite_path,
        OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
    )?;

    let staging = partial_path(dir);
    if staging.exists() {
        fs::remove_dir_all(&staging)?;
    }
    ensure_directory(&staging)?;

    let companies = write_rows(
        &conn,
        &staging.join(COMPANY_NODES),
        &["cnpj:ID(Company)", ":LABEL"],
        "SELECT DISTINCT root_id FROM partners ORDER BY root_id",
        |row| Ok(vec![row.get(0)?, COMPANY_LABEL.to_string()]),
    )?;
    let partners = write_rows(
        &conn,
        &staging.join(PARTNER_NODES),
        &["name:ID(Partner)", ":LABEL"],
        "SELECT DISTINCT partner_name FROM partners ORDER BY partner_name",
        |row| Ok(vec![row.get(0)?, PARTNER_LABEL.to_string()]),
    )?;
    // ISO text dates order chronologically; MIN skips nulls
    let edges = write_rows(
        &conn,
        &staging.join(PARTNER_OF_EDGES),
        &[":START_ID(Partner)", ":END_ID(Company)", "start_date:date", ":TYPE"],
        "SELECT partner_name, root_id, MIN(partnership_start)
         FROM partners
         GROUP BY partner_name, root_id
         ORDER BY partner_name, root_id",
        |row| {
            let since: Option<String> = row.get(2)?;
            Ok(vec![
                row.get(0)?,
                row.get(1)?,
                since.unwrap_or_default(),
                PARTNER_OF.to_string(),
            ])
        },
    )?;

    fs::rename(&staging, dir)?;
    log_operation_complete("exported edges to", dir, edges, Some(start.elapsed()));
    Ok(GraphReport {
        path: dir.to_path_buf(),
        skipped: false,
        companies,
        partners,
        edges,
    })
}
