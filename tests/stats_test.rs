use std::sync::Arc;
use std::time::Duration;

use cnpj_pipeline::stats::{DuckDbSource, ManualClock, StatisticsSource, StatsFacade, query_statistics};

fn seed_mirror(path: &std::path::Path, companies: &[(&str, f64)]) {
    let conn = duckdb::Connection::open(path).unwrap();
    conn.execute_batch(
        "CREATE OR REPLACE TABLE companies (root_id VARCHAR, display_name VARCHAR, capital_value DOUBLE);
         CREATE OR REPLACE TABLE partners (root_id VARCHAR, partner_name VARCHAR, partnership_start DATE);
         CREATE OR REPLACE TABLE business (root_id VARCHAR, branch_order VARCHAR, check_digit VARCHAR,
             is_headquarters BOOLEAN, branch_name VARCHAR, closing_date DATE, opening_date DATE,
             postal_code VARCHAR);
         INSERT INTO partners VALUES ('00000001', 'ANA', DATE '2001-02-03'), ('00000001', 'BIA', NULL);
         INSERT INTO business VALUES
             ('00000001', '0001', '10', true, 'SEDE', NULL, DATE '2001-01-01', '01000000'),
             ('00000001', '0002', '20', false, NULL, DATE '2010-05-05', DATE '2005-01-01', '02000000');",
    )
    .unwrap();
    for (root_id, capital) in companies {
        conn.execute(
            "INSERT INTO companies VALUES (?, 'X', ?)",
            duckdb::params![root_id, capital],
        )
        .unwrap();
    }
}

#[test]
fn summary_over_a_mirror() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("rfb.duckdb");
    seed_mirror(&path, &[("00000001", 10.0), ("00000002", 30.0)]);

    let conn = duckdb::Connection::open(&path).unwrap();
    let stats = query_statistics(&conn).unwrap();
    assert_eq!(stats.companies.row_count, 2);
    assert_eq!(stats.companies.avg_capital, Some(20.0));
    assert_eq!(stats.partners.distinct_partner_names, 2);
    assert_eq!(stats.partners.latest_start, chrono::NaiveDate::from_ymd_opt(2001, 2, 3));
    assert_eq!(stats.business.closed_count, 1);
    assert_eq!(stats.business.headquarters_count, 1);
    assert_eq!(stats.business.earliest_opening, chrono::NaiveDate::from_ymd_opt(2001, 1, 1));
}

#[test]
fn rebuilt_mirror_is_visible_only_after_expiry() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("rfb.duckdb");
    seed_mirror(&path, &[("00000001", 10.0)]);

    let clock = Arc::new(ManualClock::new());
    let facade = StatsFacade::new(DuckDbSource::new(&path), Duration::from_secs(60), clock.clone());
    assert_eq!(facade.statistics().unwrap().companies.row_count, 1);

    seed_mirror(&path, &[("00000001", 10.0), ("00000002", 30.0), ("00000003", 50.0)]);
    assert_eq!(facade.statistics().unwrap().companies.row_count, 1);
    assert!(facade.is_cached());

    clock.advance(Duration::from_secs(60));
    assert!(!facade.is_cached());
    assert_eq!(facade.statistics().unwrap().companies.row_count, 3);
}

#[test]
fn missing_mirror_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let source = DuckDbSource::new(dir.path().join("absent.duckdb"));
    assert!(source.compute().is_err());
}
