//! Raw files to columnar file, chunk by chunk

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;

use crate::columnar::{ColumnarWriter, append_properties, read_key_set, rematerialize, sort_batch};
use crate::config::PipelineConfig;
use crate::error::{PipelineError, Result};
use crate::filter::{BatchFilter, FilterChain, FirstOccurrenceFilter, RootIdFilter};
use crate::schema::{EntityKind, ROOT_ID};
use crate::transform::normalize::{ChunkNormalizer, normalizer_for};
use crate::transform::reader::RawChunkReader;
use crate::utils::logging::{
    create_row_counter, finish_progress_bar, log_operation_complete, log_operation_start, log_skip,
    log_warning,
};

/// Outcome of transforming one dataset
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TransformReport {
    pub entity: Option<EntityKind>,
    pub output: PathBuf,
    /// Output already existed and nothing was done
    pub skipped: bool,
    pub files: usize,
    pub chunks: usize,
    /// Rows accepted by the raw reader
    pub rows_read: usize,
    /// Malformed rows skipped by the raw reader
    pub rows_malformed: usize,
    /// Rows dropped by normalization for missing required values
    pub rows_incomplete: usize,
    /// Rows removed by the semi-join and de-duplication
    pub rows_filtered: usize,
    pub rows_written: usize,
}

/// Inputs of one raw-to-columnar conversion
pub struct CsvToColumnar<'a> {
    pub inputs: &'a [PathBuf],
    pub output: &'a Path,
    pub normalizer: &'a dyn ChunkNormalizer,
    pub filters: &'a FilterChain,
    pub sort_keys: &'a [String],
    pub chunk_size: usize,
    pub show_progress: bool,
}

impl CsvToColumnar<'_> {
    /// Stream every input through normalization, filtering and the local sort
    /// into one columnar file
    pub fn run(&self) -> Result<TransformReport> {
        let kind = self.normalizer.kind();
        let mut report = TransformReport {
            entity: Some(kind),
            output: self.output.to_path_buf(),
            ..TransformReport::default()
        };

        let schema = self.normalizer.schema().arrow_schema();
        if let Some(column) = self
            .filters
            .required_columns()
            .into_iter()
            .find(|c| schema.index_of(c).is_err())
        {
            return Err(PipelineError::column(column, format!("needed by a filter on {kind}")));
        }
        let mut writer = ColumnarWriter::create(self.output, schema, append_properties())?;
        let progress = create_row_counter(kind.table_name(), self.show_progress);

        for input in self.inputs {
            log_operation_start(&format!("Transforming {kind} from"), input);
            report.files += 1;

            let mut reader =
                RawChunkReader::open(input, self.normalizer.schema().clone(), self.chunk_size)?;
            while let Some(chunk) = reader.next_chunk()? {
                let raw_rows = chunk.rows;
                let normalized = self.normalizer.normalize(chunk)?;
                let complete_rows = normalized.num_rows();
                let kept = self.filters.filter(&normalized)?;
                let sorted = sort_batch(&kept, self.sort_keys)?;
                writer.append(&sorted)?;

                report.chunks += 1;
                report.rows_incomplete += raw_rows - complete_rows;
                report.rows_filtered += complete_rows - sorted.num_rows();
                progress.inc(raw_rows as u64);
                log::info!(
                    "[{kind}] chunk {} processed: {raw_rows} read, {} kept",
                    report.chunks,
                    sorted.num_rows()
                );
            }

            report.rows_read += reader.rows_read();
            report.rows_malformed += reader.rows_skipped();
            if reader.rows_skipped() > 0 {
                log_warning(
                    &format!("Skipped {} malformed rows", reader.rows_skipped()),
                    Some(input),
                );
            }
        }

        report.rows_written = writer.finish()?;
        finish_progress_bar(&progress, Some("done"));
        Ok(report)
    }
}

/// Filters applied to `kind` during transformation
///
/// Companies and branches are restricted to root identifiers present in the
/// finished partner file; companies are also reduced to the first row per
/// identifier within each chunk.
pub fn filters_for(config: &PipelineConfig, kind: EntityKind) -> Result<FilterChain> {
    if !kind.is_partner_filtered() {
        return Ok(FilterChain::new());
    }

    let reference = config.parquet_path(EntityKind::Partner);
    let keys = read_key_set(&reference, ROOT_ID)?;
    log::info!("Loaded {} partner root identifiers for the semi-join", keys.len());

    let chain = FilterChain::new().with(RootIdFilter::new(Arc::new(keys)));
    Ok(match kind {
        EntityKind::Company => chain.with(FirstOccurrenceFilter::new(&[ROOT_ID])),
        _ => chain,
    })
}

/// Transform one dataset, skipping it when its output already exists
pub fn transform_entity(config: &PipelineConfig, kind: EntityKind) -> Result<TransformReport> {
    let output = config.parquet_path(kind);
    if output.exists() {
        log_skip("columnar output already exists", &output);
        return Ok(TransformReport {
            entity: Some(kind),
            output,
            skipped: true,
            ..TransformReport::default()
        });
    }

    let inputs = config.raw_files(kind);
    if inputs.is_empty() {
        log_warning(&format!("No raw files found for {kind}"), Some(&config.raw_dir(kind)));
    }

    let start = Instant::now();
    let normalizer = normalizer_for(config.entity_schema(kind)?);
    let filters = filters_for(config, kind)?;
    let sort_keys = &config.dataset(kind).sort_keys;

    let report = CsvToColumnar {
        inputs: &inputs,
        output: &output,
        normalizer: normalizer.as_ref(),
        filters: &filters,
        sort_keys,
        chunk_size: config.chunk_size,
        show_progress: config.show_progress,
    }
    .run()?;

    if config.rematerialize {
        rematerialize(&output, sort_keys)?;
    }

    log_operation_complete("transformed", &output, report.rows_written, Some(start.elapsed()));
    Ok(report)
}

/// Transform all datasets, partners first
pub fn transform_all(config: &PipelineConfig) -> Result<Vec<TransformReport>> {
    EntityKind::TRANSFORM_ORDER
        .iter()
        .map(|&kind| transform_entity(config, kind))
        .collect()
}
