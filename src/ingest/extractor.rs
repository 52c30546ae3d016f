//! Single consumer that unpacks queued archives
//!
//! Each archive must hold exactly one entry, which is copied to the raw file
//! path through a fixed-size buffer. Failures are logged per item and the
//! consumer keeps draining the queue.

use std::fs::{self, File};
use std::io::{BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use indicatif::ProgressBar;
use serde::Serialize;
use zip::ZipArchive;

use crate::error::util::{partial_path, safe_open_file};
use crate::error::{PipelineError, Result};
use crate::ingest::queue::{WorkItem, WorkReceiver};
use crate::utils::logging::{log_operation_complete, log_operation_start};

/// Outcome of the extraction consumer
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ExtractionReport {
    /// Raw files written
    pub extracted: Vec<PathBuf>,
    /// Archives that could not be extracted, with the reason
    pub failed: Vec<(PathBuf, String)>,
    /// Archives that did not hold exactly one entry, with their entry count
    pub shape_violations: Vec<(PathBuf, usize)>,
    pub bytes: u64,
}

impl ExtractionReport {
    /// Items acknowledged by the consumer, whatever their outcome
    #[must_use]
    pub fn processed(&self) -> usize {
        self.extracted.len() + self.failed.len() + self.shape_violations.len()
    }

    /// The first structural violation, as the error that fails the run
    #[must_use]
    pub fn first_violation(&self) -> Option<PipelineError> {
        self.shape_violations
            .first()
            .map(|(path, entries)| PipelineError::ArchiveShape {
                path: path.clone(),
                entries: *entries,
            })
    }
}

/// Copy the only entry of `archive` to `output`
///
/// # Arguments
/// * `archive` - Zip file to open
/// * `output` - Destination of the entry's bytes
/// * `buffer` - Copy buffer size in bytes
pub fn extract_single(archive: &Path, output: &Path, buffer: usize) -> Result<u64> {
    let file = safe_open_file(archive, "archive extraction")?;
    let mut zip = ZipArchive::new(file)?;
    if zip.len() != 1 {
        return Err(PipelineError::ArchiveShape {
            path: archive.to_path_buf(),
            entries: zip.len(),
        });
    }

    let mut entry = zip.by_index(0)?;
    let partial = partial_path(output);
    let copied = (|| -> Result<u64> {
        let mut writer = BufWriter::with_capacity(buffer.max(1), File::create(&partial)?);
        let mut buf = vec![0u8; buffer.max(1)];
        let mut written = 0u64;
        loop {
            let n = entry.read(&mut buf)?;
            if n == 0 {
                break;
            }
            writer.write_all(&buf[..n])?;
            written += n as u64;
        }
        writer.flush()?;
        Ok(written)
    })();

    match copied {
        Ok(written) => {
            fs::rename(&partial, output)?;
            Ok(written)
        }
        Err(e) => {
            let _ = fs::remove_file(&partial);
            Err(e)
        }
    }
}

/// Drain the queue until every producer is gone
pub async fn run_extractor(mut queue: WorkReceiver, buffer: usize, progress: ProgressBar) -> ExtractionReport {
    let mut report = ExtractionReport::default();

    while let Some(item) = queue.recv().await {
        let WorkItem {
            entity,
            archive,
            output,
            ..
        } = item;
        log_operation_start(&format!("[extract] {entity}"), &archive);

        let (src, dst) = (archive.clone(), output.clone());
        let outcome = tokio::task::spawn_blocking(move || extract_single(&src, &dst, buffer))
            .await
            .map_err(PipelineError::from)
            .and_then(|r| r);

        match outcome {
            Ok(bytes) => {
                log_operation_complete("extracted", &archive, 1, None);
                report.bytes += bytes;
                report.extracted.push(output);
            }
            Err(PipelineError::ArchiveShape { path, entries }) => {
                log::error!(
                    "[extract] {} holds {entries} entries, expected exactly one",
                    path.display()
                );
                report.shape_violations.push((path, entries));
            }
            Err(e) => {
                log::error!("[extract] {} failed: {e}", archive.display());
                report.failed.push((archive, e.to_string()));
            }
        }
        progress.inc(1);
    }

    progress.finish_with_message(format!("{} archives extracted", report.extracted.len()));
    report
}
