mod utils;

use cnpj_pipeline::{EntityKind, PipelineConfig, Store, build_store, transform_all};

use crate::utils::{branch_row, company_row, partner_row, test_config, write_raw};

fn prepared(dir: &std::path::Path) -> PipelineConfig {
    let config = test_config(dir, 2);
    write_raw(
        &config,
        EntityKind::Partner,
        0,
        &[
            partner_row("2", "MARIA SILVA", "20200115"),
            partner_row("3", "JOSE SILVA", "20190301"),
        ],
    );
    // the same relation again in another part
    write_raw(&config, EntityKind::Partner, 1, &[partner_row("2", "MARIA SILVA", "20200115")]);
    write_raw(
        &config,
        EntityKind::Company,
        0,
        &[
            company_row("2", "MARIA SILVA COMERCIO", "100,00"),
            company_row("3", "BANCO BETA SA", "5.000,00"),
        ],
    );
    write_raw(&config, EntityKind::Company, 1, &[company_row("2", "OUTRO NOME", "1,00")]);
    write_raw(
        &config,
        EntityKind::Branch,
        0,
        &[
            branch_row("2", "1", "91", true, "LOJA MARIA", "", "20200120", "01310100"),
            branch_row("2", "2", "72", false, "FILIAL", "20230101", "20210101", "01310200"),
            branch_row("3", "1", "50", true, "", "", "20190401", ""),
        ],
    );
    write_raw(
        &config,
        EntityKind::Branch,
        1,
        &[branch_row("2", "1", "91", true, "LOJA REPETIDA", "", "20200120", "01310100")],
    );
    transform_all(&config).unwrap();
    config
}

#[test]
fn keys_are_unique_after_loading() {
    let dir = tempfile::tempdir().unwrap();
    let config = prepared(dir.path());

    let report = build_store(&config).unwrap();
    assert!(!report.skipped);
    assert!(config.sqlite_path.exists());

    let store = Store::open(&config.sqlite_path).unwrap();
    assert_eq!(store.count(EntityKind::Company).unwrap(), 2);
    assert_eq!(store.count(EntityKind::Partner).unwrap(), 2);
    assert_eq!(store.count(EntityKind::Branch).unwrap(), 3);

    let company = store.find_company("2").unwrap().unwrap();
    assert_eq!(company.display_name.as_deref(), Some("MARIA SILVA COMERCIO"));
    assert_eq!(company.capital_value, Some(100.0));

    let branches = store.find_branches("00000002").unwrap();
    assert_eq!(branches.len(), 2);
    assert!(branches[0].is_headquarters);
    assert_eq!(branches[0].branch_name.as_deref(), Some("LOJA MARIA"));
    assert_eq!(
        branches[1].closing_date,
        chrono::NaiveDate::from_ymd_opt(2023, 1, 1)
    );

    let partners = store.find_partners("3").unwrap();
    assert_eq!(partners.len(), 1);
    assert_eq!(partners[0].partner_name, "JOSE SILVA");

    let loads: Vec<_> = report.tables.iter().map(|t| (t.entity, t.duplicates)).collect();
    assert_eq!(
        loads,
        [
            (EntityKind::Company, 1),
            (EntityKind::Partner, 1),
            (EntityKind::Branch, 1)
        ]
    );
    assert!(store.find_company("9").unwrap().is_none());
}

#[test]
fn name_search_is_anchored_at_the_first_word() {
    let dir = tempfile::tempdir().unwrap();
    let config = prepared(dir.path());
    build_store(&config).unwrap();
    let store = Store::open(&config.sqlite_path).unwrap();

    let hits = store.search_names(EntityKind::Partner, "MARIA", 10).unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].name, "MARIA SILVA");
    assert_eq!(hits[0].root_id, "00000002");

    assert!(store.search_names(EntityKind::Partner, "SILVA", 10).unwrap().is_empty());
    assert_eq!(store.search_names(EntityKind::Partner, "mar", 10).unwrap().len(), 1);
    assert_eq!(store.search_names(EntityKind::Company, "BANCO BE", 10).unwrap().len(), 1);
    assert!(store.search_names(EntityKind::Company, "   ", 10).unwrap().is_empty());

    // without the anchor any word matches
    assert_eq!(store.match_raw(EntityKind::Partner, "SILVA", 10).unwrap().len(), 2);
}

#[test]
fn indexes_exist_after_loading() {
    let dir = tempfile::tempdir().unwrap();
    let config = prepared(dir.path());
    let report = build_store(&config).unwrap();
    assert!(!report.index.before.is_empty());
    assert!(!report.index.after.is_empty());

    let store = Store::open(&config.sqlite_path).unwrap();
    let names: Vec<String> = store
        .connection()
        .prepare("SELECT name FROM sqlite_master WHERE type = 'index' AND name LIKE 'idx_%'")
        .unwrap()
        .query_map([], |r| r.get(0))
        .unwrap()
        .collect::<Result<_, _>>()
        .unwrap();
    for (name, _, _) in cnpj_pipeline::store::index::BTREE_INDEXES {
        assert!(names.iter().any(|n| n == name), "missing {name}");
    }
}

#[test]
fn existing_store_is_kept_unless_rebuilt() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = prepared(dir.path());
    build_store(&config).unwrap();

    assert!(build_store(&config).unwrap().skipped);

    config.rebuild_store = true;
    let rebuilt = build_store(&config).unwrap();
    assert!(!rebuilt.skipped);
    assert_eq!(Store::open(&config.sqlite_path).unwrap().count(EntityKind::Company).unwrap(), 2);
}

#[test]
fn missing_columnar_input_leaves_no_store() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path(), 1);
    assert!(build_store(&config).is_err());
    assert!(!config.sqlite_path.exists());
}
