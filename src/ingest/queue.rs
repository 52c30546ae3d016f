//! Work items passed from the fetch workers to the extractor

use std::path::PathBuf;

use tokio::sync::mpsc;

use crate::schema::EntityKind;

/// One downloaded archive waiting for extraction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkItem {
    pub entity: EntityKind,
    pub part: usize,
    /// Downloaded archive in the staging area
    pub archive: PathBuf,
    /// Raw file the single archive entry is written to
    pub output: PathBuf,
}

/// Producer side of the bounded work queue
pub type WorkSender = mpsc::Sender<WorkItem>;

/// Consumer side of the bounded work queue
pub type WorkReceiver = mpsc::Receiver<WorkItem>;

/// Bounded multi-producer, single-consumer queue
///
/// The consumer sees the end of the queue once every sender is dropped, which
/// happens when all fetch workers have finished.
#[must_use]
pub fn work_queue(capacity: usize) -> (WorkSender, WorkReceiver) {
    mpsc::channel(capacity.max(1))
}
