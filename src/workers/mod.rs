//! Pipeline worker threads
//!
//! - [`AcquisitionWorker`] pulls frames from the source into the queue
//! - [`ProcessingWorker`] drains the queue into the sink
//! - [`ConnectivityMonitor`] rediscovers and validates a lost device

mod acquisition;
mod monitor;
mod processing;

pub(crate) use acquisition::AcquisitionWorker;
pub(crate) use monitor::ConnectivityMonitor;
pub(crate) use processing::ProcessingWorker;

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::PipelineError;
use crate::coordinator::Coordinator;

/// Shared, exclusively-locked frame source.
pub(crate) type SharedSource<S> = Arc<Mutex<S>>;

pub(crate) fn lock_source<S>(source: &SharedSource<S>) -> MutexGuard<'_, S> {
    source.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Fails the pipeline if the owning thread unwinds.
pub(crate) struct PanicGuard {
    name: String,
    coordinator: Arc<Coordinator>,
}

impl PanicGuard {
    pub fn new(name: impl Into<String>, coordinator: Arc<Coordinator>) -> Self {
        Self { name: name.into(), coordinator }
    }
}

impl Drop for PanicGuard {
    fn drop(&mut self) {
        if std::thread::panicking() {
            self.coordinator.abort(PipelineError::ThreadPanicked { name: self.name.clone() });
        }
    }
}
