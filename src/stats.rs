//! Pipeline counters

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// Live counters shared by all pipeline threads.
#[derive(Debug, Default)]
pub(crate) struct StatsRecorder {
    pub frames_acquired: AtomicU64,
    pub frames_enqueued: AtomicU64,
    pub frames_processed: AtomicU64,
    pub frames_failed: AtomicU64,
    pub frames_incomplete: AtomicU64,
    pub timeouts: AtomicU64,
    pub disconnects: AtomicU64,
    pub reconnects: AtomicU64,
    pub rediscovery_attempts: AtomicU64,
    pub rediscovery_cycles: AtomicU64,
    pub buffers_requeued: AtomicU64,
    pub sequence_gaps: AtomicU64,
}

impl StatsRecorder {
    pub fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> PipelineStats {
        let load = |c: &AtomicU64| c.load(Ordering::Relaxed);
        PipelineStats {
            frames_acquired: load(&self.frames_acquired),
            frames_enqueued: load(&self.frames_enqueued),
            frames_processed: load(&self.frames_processed),
            frames_failed: load(&self.frames_failed),
            frames_incomplete: load(&self.frames_incomplete),
            timeouts: load(&self.timeouts),
            disconnects: load(&self.disconnects),
            reconnects: load(&self.reconnects),
            rediscovery_attempts: load(&self.rediscovery_attempts),
            rediscovery_cycles: load(&self.rediscovery_cycles),
            buffers_requeued: load(&self.buffers_requeued),
            sequence_gaps: load(&self.sequence_gaps),
        }
    }
}

/// Point-in-time copy of the pipeline counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineStats {
    /// Frames returned by the source, including incomplete ones
    pub frames_acquired: u64,
    /// Frames handed to the queue
    pub frames_enqueued: u64,
    /// Frames the sink accepted
    pub frames_processed: u64,
    /// Frames the sink rejected
    pub frames_failed: u64,
    pub frames_incomplete: u64,
    /// Benign frame timeouts
    pub timeouts: u64,
    pub disconnects: u64,
    pub reconnects: u64,
    /// Individual rediscover/reconnect attempts
    pub rediscovery_attempts: u64,
    /// Times the monitor entered rediscovery
    pub rediscovery_cycles: u64,
    pub buffers_requeued: u64,
    /// Frame id discontinuities observed by the producer
    pub sequence_gaps: u64,
}

impl PipelineStats {
    /// Frames delivered to the sink, successfully or not.
    pub fn frames_delivered(&self) -> u64 {
        self.frames_processed + self.frames_failed
    }
}
