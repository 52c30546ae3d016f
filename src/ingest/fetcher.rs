//! HTTP download of archive parts
//!
//! One worker per dataset walks the part indices in order. A part whose raw
//! file already exists is skipped; a part that fails to download is logged and
//! left out, and the worker moves on.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use futures::StreamExt;
use indicatif::ProgressBar;
use serde::Serialize;
use tokio::io::{AsyncWriteExt, BufWriter};

use crate::config::PipelineConfig;
use crate::error::util::partial_path;
use crate::error::{PipelineError, Result};
use crate::ingest::queue::{WorkItem, WorkSender};
use crate::schema::EntityKind;
use crate::utils::logging::{log_operation_start, log_skip};

/// Outcome of one dataset's fetch worker
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FetchReport {
    pub entity: Option<EntityKind>,
    /// Parts whose raw file already existed
    pub skipped: Vec<usize>,
    /// Parts downloaded and queued for extraction
    pub queued: Vec<usize>,
    /// Parts that failed, with the reason
    pub failed: Vec<(usize, String)>,
    pub bytes: u64,
}

/// Streams remote archives to disk
#[derive(Debug, Clone)]
pub struct Fetcher {
    client: reqwest::Client,
    buffer: usize,
}

impl Fetcher {
    pub fn new(buffer: usize) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self::with_client(client, buffer))
    }

    #[must_use]
    pub const fn with_client(client: reqwest::Client, buffer: usize) -> Self {
        Self { client, buffer }
    }

    /// Download `url` to `dest`, returning the number of bytes written
    ///
    /// The body is streamed through a write buffer of the configured size into
    /// a `.partial` file that is renamed once complete.
    pub async fn download(&self, url: &str, dest: &Path) -> Result<u64> {
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(PipelineError::Download {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let partial = partial_path(dest);
        let file = tokio::fs::File::create(&partial).await?;
        let mut writer = BufWriter::with_capacity(self.buffer.max(1), file);
        let mut stream = response.bytes_stream();
        let mut written = 0u64;

        let copied: Result<()> = async {
            while let Some(chunk) = stream.next().await {
                let chunk = chunk?;
                writer.write_all(&chunk).await?;
                written += chunk.len() as u64;
            }
            writer.flush().await?;
            Ok::<(), PipelineError>(())
        }
        .await;

        if let Err(e) = copied {
            let _ = tokio::fs::remove_file(&partial).await;
            return Err(e);
        }
        tokio::fs::rename(&partial, dest).await?;
        Ok(written)
    }
}

/// Fetch every part of one dataset and queue the archives for extraction
pub async fn fetch_dataset(
    config: Arc<PipelineConfig>,
    entity: EntityKind,
    fetcher: Fetcher,
    queue: WorkSender,
    progress: ProgressBar,
) -> FetchReport {
    let mut report = FetchReport {
        entity: Some(entity),
        ..FetchReport::default()
    };

    for part in 0..config.parts {
        progress.inc(1);
        let output = config.raw_path(entity, part);
        if output.exists() {
            log_skip("raw file already extracted", &output);
            report.skipped.push(part);
            continue;
        }

        let url = config.archive_url(entity, part);
        let archive: PathBuf = config.archive_path(entity, part);
        log::info!("[download] {url}");
        match fetcher.download(&url, &archive).await {
            Ok(bytes) => {
                report.bytes += bytes;
                log_operation_start("Queued for extraction:", &archive);
                let item = WorkItem {
                    entity,
                    part,
                    archive,
                    output,
                };
                if queue.send(item).await.is_err() {
                    log::error!("[download] extractor stopped, abandoning {entity}");
                    report.failed.push((part, "extractor stopped".to_string()));
                    break;
                }
                report.queued.push(part);
            }
            Err(e) => {
                log::error!("[download] {url} failed: {e}");
                report.failed.push((part, e.to_string()));
            }
        }
    }

    progress.finish_with_message(format!("{entity} fetched"));
    report
}
