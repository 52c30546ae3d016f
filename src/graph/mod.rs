//! Partner graph export (companies, partners and who is a partner of what)

pub mod export;

pub use export::{GraphReport, export_partner_graph};

use crate::config::PipelineConfig;
use crate::error::Result;
use crate::utils::logging::log_skip;

/// Export the partner graph of this run, unless an export already exists
pub fn build_graph(config: &PipelineConfig) -> Result<GraphReport> {
    let path = config.graph_dir.clone();
    if path.exists() {
        log_skip("graph export already exists", &path);
        return Ok(GraphReport {
            path,
            skipped: true,
            ..GraphReport::default()
        });
    }
    export_partner_graph(&config.sqlite_path, &path)
}
