//! Aggregate statistics over the analytic mirror

use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use duckdb::{AccessMode, Config, Connection};
use serde::{Deserialize, Serialize};

use crate::error::Result;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CompanyStats {
    pub row_count: u64,
    pub distinct_root_ids: u64,
    pub min_capital: Option<f64>,
    pub max_capital: Option<f64>,
    pub avg_capital: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartnerStats {
    pub row_count: u64,
    pub distinct_root_ids: u64,
    pub distinct_partner_names: u64,
    pub earliest_start: Option<NaiveDate>,
    pub latest_start: Option<NaiveDate>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BusinessStats {
    pub row_count: u64,
    pub distinct_root_ids: u64,
    pub earliest_opening: Option<NaiveDate>,
    pub latest_opening: Option<NaiveDate>,
    pub earliest_closing: Option<NaiveDate>,
    pub latest_closing: Option<NaiveDate>,
    /// Establishments with a closing date
    pub closed_count: u64,
    pub headquarters_count: u64,
}

/// Summary served to the web layer, keyed by table name
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Statistics {
    pub companies: CompanyStats,
    pub partners: PartnerStats,
    pub business: BusinessStats,
}

/// Anything able to compute a fresh [`Statistics`]
pub trait StatisticsSource: Send + Sync {
    fn compute(&self) -> Result<Statistics>;
}

fn count(value: i64) -> u64 {
    u64::try_from(value).unwrap_or_default()
}

/// Statistics queried from the DuckDB mirror, opened read-only per refresh
#[derive(Debug, Clone)]
pub struct DuckDbSource {
    path: PathBuf,
}

impl DuckDbSource {
    #[must_use]
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    fn open(&self) -> Result<Connection> {
        let config = Config::default().access_mode(AccessMode::ReadOnly)?;
        Ok(Connection::open_with_flags(&self.path, config)?)
    }
}

/// Run the three summary queries on an open connection
pub fn query_statistics(conn: &Connection) -> Result<Statistics> {
    let companies = conn.query_row(
        "SELECT COUNT(*), COUNT(DISTINCT root_id),
                MIN(capital_value), MAX(capital_value), AVG(capital_value)
         FROM companies",
        [],
        |r| {
            Ok(CompanyStats {
                row_count: count(r.get(0)?),
                distinct_root_ids: count(r.get(1)?),
                min_capital: r.get(2)?,
                max_capital: r.get(3)?,
                avg_capital: r.get(4)?,
            })
        },
    )?;

    let partners = conn.query_row(
        "SELECT COUNT(*), COUNT(DISTINCT root_id), COUNT(DISTINCT partner_name),
                MIN(partnership_start), MAX(partnership_start)
         FROM partners",
        [],
        |r| {
            Ok(PartnerStats {
                row_count: count(r.get(0)?),
                distinct_root_ids: count(r.get(1)?),
                distinct_partner_names: count(r.get(2)?),
                earliest_start: r.get(3)?,
                latest_start: r.get(4)?,
            })
        },
    )?;

    let business = conn.query_row(
        "SELECT COUNT(*), COUNT(DISTINCT root_id),
                MIN(opening_date), MAX(opening_date),
                MIN(closing_date), MAX(closing_date),
                COUNT(closing_date), COUNT(*) FILTER (WHERE is_headquarters)
         FROM business",
        [],
        |r| {
            Ok(BusinessStats {
                row_count: count(r.get(0)?),
                distinct_root_ids: count(r.get(1)?),
                earliest_opening: r.get(2)?,
                latest_opening: r.get(3)?,
                earliest_closing: r.get(4)?,
                latest_closing: r.get(5)?,
                closed_count: count(r.get(6)?),
                headquarters_count: count(r.get(7)?),
            })
        },
    )?;

    Ok(Statistics {
        companies,
        partners,
        business,
    })
}

impl StatisticsSource for DuckDbSource {
    fn compute(&self) -> Result<Statistics> {
        log::info!("Refreshing statistics from {}", self.path.display());
        let conn = self.open()?;
        query_statistics(&conn)
    }
}
