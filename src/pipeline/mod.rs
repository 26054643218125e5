//! Running pipeline handle

use futures::Stream;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio_stream::wrappers::WatchStream;
use tracing::{debug, error, info};

use crate::config::PipelineConfig;
use crate::coordinator::Coordinator;
use crate::driver::{Driver, WorkerThread};
use crate::sink::Sink;
use crate::source::FrameSource;
use crate::stats::PipelineStats;
use crate::types::{ConnectionState, DeviceDescriptor, MonitorPhase, ShutdownReason, SubnetFingerprint};
use crate::{PipelineError, Result};

#[cfg(test)]
mod tests;

/// Summary of a pipeline run that ended without a fatal error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineReport {
    pub reason: ShutdownReason,
    pub stats: PipelineStats,
}

/// Cloneable handle that can stop a pipeline from another thread or task.
#[derive(Clone)]
pub struct ShutdownHandle {
    coordinator: Arc<Coordinator>,
}

impl ShutdownHandle {
    /// Raise the shutdown signal. Returns `false` if it was already raised.
    pub fn stop(&self) -> bool {
        self.coordinator.shutdown(ShutdownReason::Requested)
    }

    pub fn is_shutdown(&self) -> bool {
        self.coordinator.is_shutdown()
    }
}

/// A running acquisition pipeline.
///
/// Owns the producer, consumer and monitor threads. The pipeline runs until
/// the frame target is reached, a fatal error occurs, or [`Pipeline::stop`]
/// is called. Dropping a running pipeline stops it and joins its threads.
///
/// # Example
///
/// ```rust
/// use framelink::providers::SimulatedCamera;
/// use framelink::types::{DeviceDescriptor, Frame};
/// use framelink::{Pipeline, PipelineConfig};
/// use std::net::Ipv4Addr;
///
/// # fn main() -> framelink::Result<()> {
/// let device = DeviceDescriptor::new(
///     "SN-42", "GigE-2MP", Ipv4Addr::new(192, 168, 1, 10), Ipv4Addr::new(255, 255, 255, 0),
/// );
/// let camera = SimulatedCamera::new(device).with_frames(1..=3);
/// let config = PipelineConfig { frame_target: Some(3), ..Default::default() };
///
/// let pipeline = Pipeline::start(camera, |frame: Frame| -> anyhow::Result<()> {
///     println!("frame {}", frame.id());
///     Ok(())
/// }, config)?;
///
/// let report = pipeline.join()?;
/// assert_eq!(report.stats.frames_processed, 3);
/// # Ok(())
/// # }
/// ```
pub struct Pipeline {
    coordinator: Arc<Coordinator>,
    threads: Vec<WorkerThread>,
    stop_stream: Option<Box<dyn FnOnce() + Send>>,
}

impl Pipeline {
    /// Start streaming from `source` into `sink`.
    ///
    /// The stream is started and the device's subnet fingerprint and identity
    /// are captured before any thread is spawned; failures there are returned
    /// directly.
    pub fn start<S, K>(source: S, sink: K, config: PipelineConfig) -> Result<Self>
    where
        S: FrameSource,
        K: Sink,
    {
        let parts = Driver::spawn(source, sink, &config)?;
        info!(threads = parts.threads.len(), "Pipeline running");

        Ok(Self {
            coordinator: parts.coordinator,
            threads: parts.threads,
            stop_stream: Some(parts.stop_stream),
        })
    }

    /// Request a clean shutdown. Queued frames are still processed.
    pub fn stop(&self) -> bool {
        self.coordinator.shutdown(ShutdownReason::Requested)
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle { coordinator: Arc::clone(&self.coordinator) }
    }

    /// Wait for every thread to finish.
    ///
    /// Returns the fatal error if one ended the pipeline.
    pub fn join(mut self) -> Result<PipelineReport> {
        self.join_threads()
    }

    /// Async variant of [`Pipeline::join`].
    ///
    /// Joining blocks, so it runs on tokio's blocking pool.
    pub async fn wait(self) -> Result<PipelineReport> {
        tokio::task::spawn_blocking(move || self.join())
            .await
            .map_err(|e| {
                error!(error = %e, "Join task failed");
                PipelineError::ThreadPanicked { name: "pipeline-join".to_string() }
            })?
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.coordinator.connection_state()
    }

    pub fn monitor_phase(&self) -> MonitorPhase {
        self.coordinator.monitor_phase()
    }

    pub fn is_shutdown(&self) -> bool {
        self.coordinator.is_shutdown()
    }

    pub fn shutdown_reason(&self) -> Option<ShutdownReason> {
        self.coordinator.shutdown_reason()
    }

    pub fn stats(&self) -> PipelineStats {
        self.coordinator.stats().snapshot()
    }

    /// Frames waiting for a consumer. Observational only.
    pub fn queue_len(&self) -> usize {
        self.coordinator.queue().len()
    }

    /// Subnet captured when the stream started.
    pub fn subnet_fingerprint(&self) -> SubnetFingerprint {
        self.coordinator.baseline().fingerprint
    }

    /// Device captured when the stream started.
    pub fn device(&self) -> &DeviceDescriptor {
        &self.coordinator.baseline().device
    }

    /// Connection state changes as a stream.
    ///
    /// Yields the current state immediately, then each change. Intermediate
    /// states may be skipped by a slow reader; the latest state always wins.
    pub fn state_updates(&self) -> impl Stream<Item = ConnectionState> + 'static {
        WatchStream::new(self.coordinator.subscribe())
    }

    fn join_threads(&mut self) -> Result<PipelineReport> {
        let mut panicked = None;
        for worker in self.threads.drain(..) {
            if worker.handle.join().is_err() {
                error!(thread = %worker.name, "Worker thread panicked");
                panicked.get_or_insert(worker.name);
            }
        }

        if let Some(stop_stream) = self.stop_stream.take() {
            stop_stream();
        }

        if let Some(fatal) = self.coordinator.take_fatal() {
            return Err(fatal);
        }
        if let Some(name) = panicked {
            return Err(PipelineError::ThreadPanicked { name });
        }

        let report = PipelineReport {
            reason: self.coordinator.shutdown_reason().unwrap_or(ShutdownReason::Requested),
            stats: self.coordinator.stats().snapshot(),
        };
        info!(reason = %report.reason, frames = report.stats.frames_processed, "Pipeline finished");
        Ok(report)
    }
}

impl Drop for Pipeline {
    fn drop(&mut self) {
        if self.threads.is_empty() {
            return;
        }
        debug!("Dropping running pipeline");
        self.coordinator.shutdown(ShutdownReason::Requested);
        let _ = self.join_threads();
    }
}
