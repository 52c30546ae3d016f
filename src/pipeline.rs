//! Stage orchestration
//!
//! Stages run strictly one after another. Synchronous stages run on the
//! blocking pool so the runtime stays free for the ingest tasks.

use std::time::{Duration, Instant};

use serde::Serialize;

use crate::analytic::{MirrorReport, build_mirror};
use crate::config::PipelineConfig;
use crate::error::Result;
use crate::graph::{GraphReport, build_graph};
use crate::ingest::{IngestReport, ingest};
use crate::store::{StoreReport, build_store};
use crate::transform::{TransformReport, transform_all};

/// Outcome of a full run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunReport {
    pub ingest: IngestReport,
    pub transform: Vec<TransformReport>,
    pub store: StoreReport,
    pub mirror: MirrorReport,
    pub graph: GraphReport,
    pub elapsed: Duration,
}

async fn blocking<T, F>(config: &PipelineConfig, stage: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce(&PipelineConfig) -> Result<T> + Send + 'static,
{
    let config = config.clone();
    tokio::task::spawn_blocking(move || stage(&config)).await?
}

/// Download and extract the raw files
pub async fn run_ingest(config: &PipelineConfig) -> Result<IngestReport> {
    ingest(config).await
}

/// Raw files to columnar files
pub async fn run_transform(config: &PipelineConfig) -> Result<Vec<TransformReport>> {
    blocking(config, transform_all).await
}

/// Columnar files to the transactional store
pub async fn run_store(config: &PipelineConfig) -> Result<StoreReport> {
    blocking(config, build_store).await
}

/// Transactional store to the analytic mirror
pub async fn run_mirror(config: &PipelineConfig) -> Result<MirrorReport> {
    blocking(config, build_mirror).await
}

/// Transactional store to the partner graph files
pub async fn run_graph(config: &PipelineConfig) -> Result<GraphReport> {
    blocking(config, build_graph).await
}

/// Every stage in order, stopping at the first failure
pub async fn run_all(config: &PipelineConfig) -> Result<RunReport> {
    config.validate()?;
    let start = Instant::now();
    log::info!("Starting pipeline run against {}", config.base_url);

    let ingest = run_ingest(config).await?;
    let transform = run_transform(config).await?;
    let store = run_store(config).await?;
    let mirror = run_mirror(config).await?;
    let graph = run_graph(config).await?;

    let elapsed = start.elapsed();
    log::info!("Pipeline run finished in {elapsed:?}");
    Ok(RunReport {
        ingest,
        transform,
        store,
        mirror,
        graph,
        elapsed,
    })
}
