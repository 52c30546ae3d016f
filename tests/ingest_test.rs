mod utils;

use std::fs;

use cnpj_pipeline::ingest::Fetcher;
use cnpj_pipeline::{EntityKind, PipelineError, ingest};

use crate::utils::{archives, company_row, partner_row, raw_file, serve, test_config, write_raw, zip_bytes};

#[tokio::test]
async fn downloads_and_extracts_every_available_part() {
    let files = archives(&[
        (EntityKind::Partner, 0, vec![partner_row("1", "ANA", "20200101")]),
        (EntityKind::Partner, 1, vec![partner_row("2", "BIA", "20200101")]),
        (EntityKind::Company, 0, vec![company_row("1", "ALFA", "1,00")]),
        (EntityKind::Branch, 0, vec![]),
        (EntityKind::Branch, 1, vec![]),
    ]);
    let dir = tempfile::tempdir().unwrap();
    let mut config = test_config(dir.path(), 2);
    config.base_url = serve(files).await;

    let report = ingest(&config).await.unwrap();

    assert_eq!(report.extraction.extracted.len(), 5);
    assert!(report.extraction.failed.is_empty());
    assert!(!config.tmp_dir.exists());

    let partners = fs::read(config.raw_path(EntityKind::Partner, 1)).unwrap();
    assert_eq!(partners, raw_file(&[partner_row("2", "BIA", "20200101")]));

    let companies = report
        .fetch
        .iter()
        .find(|r| r.entity == Some(EntityKind::Company))
        .unwrap();
    assert_eq!(companies.queued, vec![0]);
    assert_eq!(companies.failed.len(), 1);
    assert_eq!(companies.failed[0].0, 1);
    assert!(!config.raw_path(EntityKind::Company, 1).exists());
}

#[tokio::test]
async fn extracted_parts_are_not_downloaded_again() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = test_config(dir.path(), 1);
    config.base_url = serve(Default::default()).await;
    for kind in EntityKind::TRANSFORM_ORDER {
        write_raw(&config, kind, 0, &[]);
    }

    let report = ingest(&config).await.unwrap();
    assert!(report.fetch.iter().all(|r| r.skipped == vec![0]));
    assert!(report.fetch.iter().all(|r| r.failed.is_empty()));
    assert_eq!(report.extraction.processed(), 0);
}

#[tokio::test]
async fn archive_with_two_entries_fails_the_stage() {
    let mut files = archives(&[
        (EntityKind::Company, 0, vec![]),
        (EntityKind::Branch, 0, vec![]),
    ]);
    files.insert(
        "Socios0.zip".to_string(),
        zip_bytes(&[("a.csv", b"x".as_slice()), ("b.csv", b"y".as_slice())]),
    );
    let dir = tempfile::tempdir().unwrap();
    let mut config = test_config(dir.path(), 1);
    config.base_url = serve(files).await;

    let err = ingest(&config).await.unwrap_err();
    assert!(matches!(err, PipelineError::ArchiveShape { entries: 2, .. }));
    assert!(!config.raw_path(EntityKind::Partner, 0).exists());
    assert!(config.raw_path(EntityKind::Company, 0).exists());
}

#[tokio::test]
async fn missing_remote_file_is_a_download_error() {
    let base = serve(Default::default()).await;
    let dir = tempfile::tempdir().unwrap();
    let dest = dir.path().join("Empresas0.zip");

    let err = Fetcher::new(4096)
        .unwrap()
        .download(&format!("{base}Empresas0.zip"), &dest)
        .await
        .unwrap_err();
    assert!(matches!(err, PipelineError::Download { status: 404, .. }));
    assert!(!dest.exists());
}
