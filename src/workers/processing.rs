//! Consumer: queue to sink

use std::sync::Arc;
use tracing::{debug, info, trace, warn};

use super::PanicGuard;
use crate::coordinator::Coordinator;
use crate::sink::Sink;
use crate::stats::StatsRecorder;

pub(crate) struct ProcessingWorker<K: Sink> {
    index: usize,
    sink: Arc<K>,
    coordinator: Arc<Coordinator>,
}

impl<K: Sink> ProcessingWorker<K> {
    pub fn new(index: usize, sink: Arc<K>, coordinator: Arc<Coordinator>) -> Self {
        Self { index, sink, coordinator }
    }

    pub fn run(self) {
        let _guard = PanicGuard::new(format!("consumer-{}", self.index), Arc::clone(&self.coordinator));
        debug!(consumer = self.index, "Processing worker started");

        let stats = self.coordinator.stats();
        let mut processed = 0u64;

        // None means the queue is closed and drained
        while let Some(frame) = self.coordinator.queue().pop() {
            let frame_id = frame.id();
            let complete = frame.is_complete();
            trace!(consumer = self.index, frame_id, complete, "Processing frame");

            match self.sink.process(frame) {
                Ok(()) => {
                    processed += 1;
                    StatsRecorder::bump(&stats.frames_processed);
                }
                Err(error) => {
                    StatsRecorder::bump(&stats.frames_failed);
                    warn!(consumer = self.index, frame_id, complete, error = %error, "Sink rejected frame, continuing");
                }
            }
        }

        info!(consumer = self.index, frames = processed, "Processing worker stopped");
    }
}
