//! One-operation-at-a-time background scheduler.
//!
//! The worker owns the lifecycle of indexing jobs for one logical document:
//! it records the target path, launches at most one operation at a time on
//! a background thread, relays progress while a pass runs, and delivers a
//! terminal event once the operation function has fully returned. Requests
//! arriving while an operation runs wait for it to finish (the interrupt
//! flag is the way to cut that wait short), then clear the flag and launch.
//!
//! Events travel over a channel, so completion is observed on whatever
//! thread owns the receiver — never on the operation thread's own stack.

use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::JoinHandle;

use crossbeam_channel::{unbounded, Receiver, Sender};
use tracing::{debug, info, warn};

use crate::config::IndexConfig;
use crate::encoding::TextEncoding;
use crate::indexing_data::IndexingData;
use crate::operations::{
    CheckFileChangesOperation, FullIndexOperation, MonitoredFileStatus, OperationResult,
    PartialIndexOperation,
};
use crate::InterruptRequest;

/// How an indexing pass ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoadingStatus {
    Successful,
    Interrupted,
}

/// Notifications delivered while and after operations run.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WorkerEvent {
    /// Percentage in `[0, 100]`; duplicates are coalesced per pass.
    IndexingProgressed(u8),
    /// Terminal event of a full or partial index.
    IndexingFinished(LoadingStatus),
    /// Terminal event of a change check.
    CheckFileChangesFinished(MonitoredFileStatus),
}

enum ScheduledOperation {
    FullIndex(Option<TextEncoding>),
    PartialIndex,
    CheckFileChanges,
}

/// Background indexing scheduler for one document.
///
/// Holds a non-owning handle on the shared [`IndexingData`]; the index must
/// outlive the worker, which `Arc` guarantees. Dropping the worker raises
/// the interrupt flag and joins the running operation.
pub struct Worker {
    indexing_data: Arc<IndexingData>,
    interrupt: Arc<InterruptRequest>,
    config: IndexConfig,
    file_path: Mutex<PathBuf>,
    operation: Mutex<Option<JoinHandle<()>>>,
    events: Sender<WorkerEvent>,
    events_rx: Receiver<WorkerEvent>,
}

impl Worker {
    pub fn new(indexing_data: Arc<IndexingData>, config: IndexConfig) -> Self {
        let (events, events_rx) = unbounded();
        Self {
            indexing_data,
            interrupt: Arc::new(InterruptRequest::new()),
            config,
            file_path: Mutex::new(PathBuf::new()),
            operation: Mutex::new(None),
            events,
            events_rx,
        }
    }

    /// Receiver for progress and completion events.
    pub fn events(&self) -> Receiver<WorkerEvent> {
        self.events_rx.clone()
    }

    /// Records the file subsequent operations will target.
    pub fn attach(&self, path: impl Into<PathBuf>) {
        let path = path.into();
        debug!(path = %path.display(), "attaching file");
        *self
            .file_path
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = path;
    }

    /// Schedules a full index, optionally pinning the encoding.
    pub fn index_all(&self, forced_encoding: Option<TextEncoding>) {
        debug!("full index requested");
        self.schedule(ScheduledOperation::FullIndex(forced_encoding));
    }

    /// Schedules a partial index of the appended tail.
    pub fn index_additional_lines(&self) {
        debug!("additional lines requested");
        self.schedule(ScheduledOperation::PartialIndex);
    }

    /// Schedules a change check on the attached file.
    pub fn check_file_changes(&self) {
        debug!("file change check requested");
        self.schedule(ScheduledOperation::CheckFileChanges);
    }

    /// Requests cooperative abort of the in-flight operation. Returns
    /// immediately; the operation winds down at the next block boundary.
    pub fn interrupt(&self) {
        info!("load interrupt requested");
        self.interrupt.set();
    }

    fn schedule(&self, operation: ScheduledOperation) {
        let mut slot = self
            .operation
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        // One operation at a time: wait out the previous one, then start
        // the new job with a clean interrupt flag.
        if let Some(handle) = slot.take() {
            if handle.join().is_err() {
                warn!("previous operation panicked");
            }
        }
        self.interrupt.clear();

        let path = self
            .file_path
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        let indexing_data = Arc::clone(&self.indexing_data);
        let interrupt = Arc::clone(&self.interrupt);
        let config = self.config;
        let events = self.events.clone();

        *slot = Some(std::thread::spawn(move || {
            let progress_events = events.clone();
            let mut progress = move |percent: u8| {
                let _ = progress_events.send(WorkerEvent::IndexingProgressed(percent));
            };

            let result = match operation {
                ScheduledOperation::FullIndex(forced_encoding) => {
                    FullIndexOperation::new(path, indexing_data, interrupt, config, forced_encoding)
                        .run(&mut progress)
                }
                ScheduledOperation::PartialIndex => {
                    PartialIndexOperation::new(path, indexing_data, interrupt, config)
                        .run(&mut progress)
                }
                ScheduledOperation::CheckFileChanges => {
                    CheckFileChangesOperation::new(path, indexing_data, interrupt, config).run()
                }
            };

            let event = match result {
                OperationResult::Completion(true) => {
                    WorkerEvent::IndexingFinished(LoadingStatus::Successful)
                }
                OperationResult::Completion(false) => {
                    info!("indexing interrupted");
                    WorkerEvent::IndexingFinished(LoadingStatus::Interrupted)
                }
                OperationResult::FileStatus(status) => {
                    WorkerEvent::CheckFileChangesFinished(status)
                }
            };
            let _ = events.send(event);
        }));
    }
}

impl Drop for Worker {
    fn drop(&mut self) {
        self.interrupt.set();
        if let Some(handle) = self
            .operation
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            let _ = handle.join();
        }
    }
}
