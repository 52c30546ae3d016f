//! Concurrent download and extraction
//!
//! One fetch task per dataset feeds a bounded queue drained by a single
//! extraction task. The orchestrator joins every fetch task, which drops the
//! last queue sender and lets the extractor finish once the queue is empty.

pub mod extractor;
pub mod fetcher;
pub mod queue;

use std::sync::Arc;
use std::time::Instant;

use futures::future::join_all;
use serde::Serialize;

use crate::config::PipelineConfig;
use crate::error::Result;
use crate::error::util::ensure_directory;
use crate::schema::EntityKind;
use crate::utils::logging::{create_main_progress_bar, create_multi_progress, log_warning};

pub use extractor::{ExtractionReport, extract_single, run_extractor};
pub use fetcher::{FetchReport, Fetcher, fetch_dataset};
pub use queue::{WorkItem, WorkReceiver, WorkSender, work_queue};

/// Outcome of the ingest stage
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IngestReport {
    pub fetch: Vec<FetchReport>,
    pub extraction: ExtractionReport,
}

/// Download and extract every part of every dataset
///
/// Per-part download and extraction failures only show up in the report. An
/// archive with other than exactly one entry fails the stage, after the queue
/// has been drained and the staging area removed.
pub async fn ingest(config: &PipelineConfig) -> Result<IngestReport> {
    let start = Instant::now();
    ensure_directory(&config.tmp_dir)?;
    for kind in EntityKind::TRANSFORM_ORDER {
        ensure_directory(&config.raw_dir(kind))?;
    }

    let config = Arc::new(config.clone());
    let fetcher = Fetcher::new(config.download_buffer)?;
    let (sender, receiver) = work_queue(config.queue_capacity);

    let progress = create_multi_progress(config.show_progress);
    let total = (config.parts * EntityKind::TRANSFORM_ORDER.len()) as u64;
    let extract_bar = progress.add(create_main_progress_bar(
        total,
        Some("extracting"),
        config.show_progress,
    ));
    let consumer = tokio::spawn(run_extractor(receiver, config.extract_buffer, extract_bar));

    let producers: Vec<_> = EntityKind::TRANSFORM_ORDER
        .into_iter()
        .map(|kind| {
            let bar = progress.add(create_main_progress_bar(
                config.parts as u64,
                Some(kind.table_name()),
                config.show_progress,
            ));
            tokio::spawn(fetch_dataset(
                Arc::clone(&config),
                kind,
                fetcher.clone(),
                sender.clone(),
                bar,
            ))
        })
        .collect();
    drop(sender);

    let mut fetch = Vec::with_capacity(producers.len());
    for joined in join_all(producers).await {
        fetch.push(joined?);
    }
    let extraction = consumer.await?;

    if config.tmp_dir.exists() {
        log::info!("Removing staging area {}", config.tmp_dir.display());
        tokio::fs::remove_dir_all(&config.tmp_dir).await?;
    }

    let failed: usize = fetch.iter().map(|r| r.failed.len()).sum();
    if failed > 0 || !extraction.failed.is_empty() {
        log_warning(
            &format!(
                "Ingest finished with {failed} failed downloads and {} failed extractions",
                extraction.failed.len()
            ),
            None,
        );
    }
    log::info!(
        "Ingest finished in {:?}: {} archives extracted",
        start.elapsed(),
        extraction.extracted.len()
    );

    if let Some(violation) = extraction.first_violation() {
        return Err(violation);
    }
    Ok(IngestReport { fetch, extraction })
}
