//! Read-only queries against the transactional store
//!
//! Point lookups by root identifier and name search through the inverted
//! indexes. This is the surface the web layer consumes.

use std::path::Path;

use rusqlite::{Connection, OpenFlags, OptionalExtension, Row, params};
use serde::Serialize;

use crate::error::{PipelineError, Result};
use crate::records::{BranchRecord, CompanyRecord, PartnerRecord};
use crate::schema::coerce::zero_pad;
use crate::schema::{EntityKind, ROOT_ID_WIDTH};
use crate::store::schema::fts_table;

/// One name search result
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NameHit {
    pub rowid: i64,
    pub root_id: String,
    pub name: String,
}

/// FTS5 expression matching names that start with the words of `text`
///
/// Words are matched in order from the first token of the name; the last word
/// may be a prefix. Returns `None` when `text` has no words.
#[must_use]
pub fn anchored_prefix_query(text: &str) -> Option<String> {
    let words: Vec<String> = text
        .split_whitespace()
        .map(|w| w.replace('"', ""))
        .filter(|w| !w.is_empty())
        .collect();
    if words.is_empty() {
        return None;
    }
    Some(format!("^\"{}\"*", words.join(" ")))
}

fn normalize_root_id(root_id: &str) -> Result<String> {
    let digits: String = root_id.chars().filter(char::is_ascii_digit).collect();
    if digits.len() > ROOT_ID_WIDTH {
        return Err(PipelineError::Config(format!(
            "'{root_id}' is longer than a root identifier"
        )));
    }
    zero_pad(&digits, ROOT_ID_WIDTH)
        .ok_or_else(|| PipelineError::Config(format!("'{root_id}' has no digits")))
}

fn branch_from_row(row: &Row<'_>) -> rusqlite::Result<BranchRecord> {
    Ok(BranchRecord {
        root_id: row.get(0)?,
        branch_order: row.get(1)?,
        check_digit: row.get(2)?,
        is_headquarters: row.get(3)?,
        branch_name: row.get(4)?,
        closing_date: row.get(5)?,
        opening_date: row.get(6)?,
        postal_code: row.get(7)?,
    })
}

/// Read-only handle on the transactional store
#[derive(Debug)]
pub struct Store {
    conn: Connection,
}

impl Store {
    /// Open an existing store without write access
    pub fn open(path: &Path) -> Result<Self> {
        if !path.is_file() {
            return Err(PipelineError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("transactional store {} does not exist", path.display()),
            )));
        }
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        Ok(Self { conn })
    }

    /// Wrap an open connection
    #[must_use]
    pub const fn from_connection(conn: Connection) -> Self {
        Self { conn }
    }

    #[must_use]
    pub const fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Rows in an entity's table
    pub fn count(&self, kind: EntityKind) -> Result<usize> {
        let n: i64 = self.conn.query_row(
            &format!("SELECT COUNT(*) FROM {}", kind.table_name()),
            [],
            |r| r.get(0),
        )?;
        Ok(usize::try_from(n).unwrap_or_default())
    }

    /// Run an FTS5 `MATCH` expression against an entity's name index
    pub fn match_raw(&self, kind: EntityKind, expression: &str, limit: usize) -> Result<Vec<NameHit>> {
        let table = kind.table_name();
        let fts = fts_table(kind);
        let column = kind.name_column();
        let sql = format!(
            "SELECT t.rowid, t.root_id, t.{column}
             FROM {fts} f JOIN {table} t ON t.rowid = f.rowid
             WHERE f.{fts} MATCH ?1
             ORDER BY f.rank
             LIMIT ?2"
        );
        let mut stmt = self.conn.prepare_cached(&sql)?;
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let hits = stmt
            .query_map(params![expression, limit], |row| {
                Ok(NameHit {
                    rowid: row.get(0)?,
                    root_id: row.get(1)?,
                    name: row.get::<_, Option<String>>(2)?.unwrap_or_default(),
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(hits)
    }

    /// Names starting with the words of `text`
    pub fn search_names(&self, kind: EntityKind, text: &str, limit: usize) -> Result<Vec<NameHit>> {
        match anchored_prefix_query(text) {
            Some(expression) => self.match_raw(kind, &expression, limit),
            None => Ok(Vec::new()),
        }
    }

    /// Company by root identifier
    pub fn find_company(&self, root_id: &str) -> Result<Option<CompanyRecord>> {
        let root_id = normalize_root_id(root_id)?;
        let company = self
            .conn
            .query_row(
                "SELECT root_id, display_name, capital_value FROM companies WHERE root_id = ?1",
                [&root_id],
                |row| {
                    Ok(CompanyRecord {
                        root_id: row.get(0)?,
                        display_name: row.get(1)?,
                        capital_value: row.get(2)?,
                    })
                },
            )
            .optional()?;
        Ok(company)
    }

    /// Establishments of a company, headquarters first
    pub fn find_branches(&self, root_id: &str) -> Result<Vec<BranchRecord>> {
        let root_id = normalize_root_id(root_id)?;
        let mut stmt = self.conn.prepare_cached(
            "SELECT root_id, branch_order, check_digit, is_headquarters, branch_name,
                    closing_date, opening_date, postal_code
             FROM business WHERE root_id = ?1
             ORDER BY is_headquarters DESC, branch_order, check_digit",
        )?;
        let branches = stmt
            .query_map([&root_id], branch_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(branches)
    }

    /// Partners of a company, oldest relation first
    pub fn find_partners(&self, root_id: &str) -> Result<Vec<PartnerRecord>> {
        let root_id = normalize_root_id(root_id)?;
        let mut stmt = self.conn.prepare_cached(
            "SELECT root_id, partner_name, partnership_start
             FROM partners WHERE root_id = ?1
             ORDER BY partnership_start, partner_name",
        )?;
        let partners = stmt
            .query_map([&root_id], |row| {
                Ok(PartnerRecord {
                    root_id: row.get(0)?,
                    partner_name: row.get(1)?,
                    partnership_start: row.get(2)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(partners)
    }
}
