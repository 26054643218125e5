//! Producer: frame source to queue

use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, trace, warn};

use super::{PanicGuard, SharedSource, lock_source};
use crate::config::PipelineConfig;
use crate::coordinator::Coordinator;
use crate::error::GrabError;
use crate::queue::QueueClosed;
use crate::source::FrameSource;
use crate::stats::StatsRecorder;
use crate::types::{Frame, ShutdownReason};

/// Result of one retrieval attempt, decided while holding the source lock.
enum Grab {
    Frame(Frame),
    Timeout,
    Lost(String),
}

pub(crate) struct AcquisitionWorker<S: FrameSource> {
    source: SharedSource<S>,
    coordinator: Arc<Coordinator>,
    frame_timeout: Duration,
    timeouts_before_probe: u32,
    frame_target: Option<u64>,
}

impl<S: FrameSource> AcquisitionWorker<S> {
    pub fn new(source: SharedSource<S>, coordinator: Arc<Coordinator>, config: &PipelineConfig) -> Self {
        Self {
            source,
            coordinator,
            frame_timeout: config.frame_timeout(),
            timeouts_before_probe: config.timeouts_before_probe,
            frame_target: config.frame_target,
        }
    }

    pub fn run(self) {
        let _guard = PanicGuard::new("acquisition", Arc::clone(&self.coordinator));
        info!(target_frames = ?self.frame_target, "Acquisition worker started");

        let stats = self.coordinator.stats();
        let mut enqueued = 0u64;
        let mut consecutive_timeouts = 0u32;
        let mut last_id: Option<u64> = None;

        let exit_reason = loop {
            if self.coordinator.is_shutdown() {
                break ShutdownReason::Requested;
            }
            if self.frame_target.is_some_and(|target| enqueued >= target) {
                info!(frames = enqueued, "Acquisition target reached");
                break ShutdownReason::TargetReached;
            }

            if !self.coordinator.connection_state().is_connected() {
                debug!("Waiting for reconnection");
                if !self.coordinator.wait_for_connection() {
                    break ShutdownReason::Requested;
                }
                consecutive_timeouts = 0;
                info!(last_frame = ?last_id, "Acquisition resumed");
                continue;
            }

            match self.grab(&mut consecutive_timeouts) {
                Grab::Frame(frame) => {
                    consecutive_timeouts = 0;
                    StatsRecorder::bump(&stats.frames_acquired);
                    if !frame.is_complete() {
                        StatsRecorder::bump(&stats.frames_incomplete);
                    }

                    let id = frame.id();
                    if let Some(previous) = last_id.filter(|p| id != p.wrapping_add(1)) {
                        warn!(previous, current = id, "Frame sequence discontinuity");
                        StatsRecorder::bump(&stats.sequence_gaps);
                    }
                    last_id = Some(id);

                    trace!(frame_id = id, size = frame.payload_size(), "Enqueueing frame");
                    match self.coordinator.queue().push(frame) {
                        Ok(()) => {
                            enqueued += 1;
                            StatsRecorder::bump(&stats.frames_enqueued);
                        }
                        Err(QueueClosed(frame)) => {
                            debug!(frame_id = frame.id(), "Queue closed, releasing frame");
                            break ShutdownReason::Requested;
                        }
                    }
                }
                Grab::Timeout => {
                    StatsRecorder::bump(&stats.timeouts);
                }
                Grab::Lost(reason) => {
                    consecutive_timeouts = 0;
                    self.coordinator.report_device_lost(&reason);
                }
            }
        };

        // No-op when shutdown was already raised elsewhere
        self.coordinator.shutdown(exit_reason);
        info!(frames = enqueued, "Acquisition worker stopped");
    }

    fn grab(&self, consecutive_timeouts: &mut u32) -> Grab {
        let mut source = lock_source(&self.source);

        match source.get_frame(self.frame_timeout) {
            Ok(frame) => Grab::Frame(self.take_ownership(&mut *source, frame)),
            Err(GrabError::Incomplete(mut frame)) => {
                debug!(frame_id = frame.id(), "Incomplete frame, delivering flagged");
                frame.mark_incomplete();
                Grab::Frame(self.take_ownership(&mut *source, frame))
            }
            Err(GrabError::Timeout(_)) => {
                let probe_due = count_timeout(consecutive_timeouts, self.timeouts_before_probe);
                trace!(streak = *consecutive_timeouts, "Frame timeout");

                if probe_due && !source.is_connected() {
                    Grab::Lost(format!(
                        "no frames for {} timeouts and device is not responding",
                        *consecutive_timeouts
                    ))
                } else {
                    Grab::Timeout
                }
            }
            Err(GrabError::DeviceLost { reason }) => Grab::Lost(reason),
        }
    }

    /// Copy device buffers out and hand them straight back to the pool.
    fn take_ownership(&self, source: &mut S, frame: Frame) -> Frame {
        if !frame.is_device_owned() {
            return frame;
        }

        let copy = frame.detach();
        source.requeue(frame);
        StatsRecorder::bump(&self.coordinator.stats().buffers_requeued);
        copy
    }
}

/// Extend the timeout streak. Returns `true` when the link should be probed.
///
/// The streak wraps instead of overflowing; it only feeds the modulo.
fn count_timeout(streak: &mut u32, probe_every: u32) -> bool {
    *streak = streak.wrapping_add(1);
    probe_every > 0 && *streak % probe_every == 0
}
