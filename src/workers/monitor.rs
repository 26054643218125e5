//! Connectivity monitor: rediscovery and post-reconnect validation
//!
//! ```text
//!  Idle ──► WaitingForDisconnectSignal ──► Rediscovering ──► ValidatingNetwork
//!                    ▲                        ▲   │                │    │
//!                    │                        └───┘ retry          │    │ subnet differs
//!                    └─────────────────────────────────────────────┘    ▼
//!                                     subnet matches                   Fatal
//! ```
//!
//! A transient disconnect is retried until the device reappears (or the
//! optional attempt budget runs out). A device that comes back on a
//! different network segment is fatal and never retried.

use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::{PanicGuard, SharedSource, lock_source};
use crate::config::PipelineConfig;
use crate::coordinator::{Baseline, Coordinator};
use crate::source::FrameSource;
use crate::stats::StatsRecorder;
use crate::types::{DeviceDescriptor, DeviceHandle, MonitorPhase, SubnetFingerprint};
use crate::{PipelineError, Result};

/// How a reconnect cycle ended.
enum Cycle {
    Restored { attempts: u32 },
    Shutdown,
    Fatal(PipelineError),
}

/// Outcome of checking a reopened device.
enum Validation {
    Valid,
    Mismatch(SubnetFingerprint),
    Retry(PipelineError),
}

pub(crate) struct ConnectivityMonitor<S: FrameSource> {
    source: SharedSource<S>,
    coordinator: Arc<Coordinator>,
    discovery_timeout: Duration,
    backoff: Duration,
    max_attempts: Option<u32>,
    require_same_device: bool,
}

impl<S: FrameSource> ConnectivityMonitor<S> {
    pub fn new(source: SharedSource<S>, coordinator: Arc<Coordinator>, config: &PipelineConfig) -> Self {
        Self {
            source,
            coordinator,
            discovery_timeout: config.discovery_timeout(),
            backoff: config.reconnect_backoff(),
            max_attempts: config.max_reconnect_attempts,
            require_same_device: config.require_same_device,
        }
    }

    pub fn run(self) {
        let _guard = PanicGuard::new("monitor", Arc::clone(&self.coordinator));
        let baseline = self.coordinator.baseline().clone();
        info!(
            subnet = %baseline.fingerprint,
            device = %baseline.device,
            "Connectivity monitor armed"
        );

        while self.coordinator.wait_for_disconnect() {
            self.coordinator.begin_reconnect();
            info!("Disconnect signalled, rediscovering device");

            match self.reconnect_cycle(&baseline) {
                Cycle::Restored { attempts } => {
                    if self.coordinator.restore_connection() {
                        info!(attempts, "Reconnect cycle complete");
                    }
                }
                Cycle::Shutdown => break,
                Cycle::Fatal(error) => {
                    self.coordinator.fail(error);
                    break;
                }
            }
        }

        self.coordinator.monitor_stopped();
    }

    fn reconnect_cycle(&self, baseline: &Baseline) -> Cycle {
        lock_source(&self.source).stop_stream();

        let stats = self.coordinator.stats();
        let mut attempts = 0u32;

        loop {
            if self.coordinator.is_shutdown() {
                return Cycle::Shutdown;
            }
            if budget_spent(attempts, self.max_attempts) {
                return Cycle::Fatal(PipelineError::ReconnectExhausted { attempts });
            }

            attempts = attempts.saturating_add(1);
            StatsRecorder::bump(&stats.rediscovery_attempts);
            self.coordinator.set_phase(MonitorPhase::Rediscovering);

            match self.rediscover(baseline) {
                Ok(handle) => {
                    self.coordinator.set_phase(MonitorPhase::ValidatingNetwork);
                    debug!(device = %handle.descriptor, generation = handle.generation, "Device reopened");

                    match self.validate(baseline) {
                        Validation::Valid => return Cycle::Restored { attempts },
                        Validation::Mismatch(found) => {
                            return Cycle::Fatal(PipelineError::SubnetMismatch {
                                expected: baseline.fingerprint,
                                found,
                            });
                        }
                        Validation::Retry(error) => {
                            warn!(attempt = attempts, error = %error, "Reopened device failed validation");
                        }
                    }
                }
                Err(error) => {
                    // First failure is worth a line, then only periodically
                    if attempts == 1 || attempts % 10 == 0 {
                        warn!(attempt = attempts, error = %error, "Device not yet reachable");
                    } else {
                        debug!(attempt = attempts, error = %error, "Device not yet reachable");
                    }
                }
            }

            if !self.coordinator.pause(self.backoff) {
                return Cycle::Shutdown;
            }
        }
    }

    /// One discovery sweep and reopen attempt.
    fn rediscover(&self, baseline: &Baseline) -> Result<DeviceHandle> {
        let mut source = lock_source(&self.source);
        let devices = source.rediscover(self.discovery_timeout)?;
        let candidate = self.select(devices, &baseline.device)?;
        source.reconnect(&candidate)
    }

    fn select(&self, devices: Vec<DeviceDescriptor>, expected: &DeviceDescriptor) -> Result<DeviceDescriptor> {
        if !self.require_same_device {
            return devices
                .into_iter()
                .next()
                .ok_or_else(|| PipelineError::DeviceNotFound { serial: expected.serial.clone() });
        }

        let mut found = None;
        for device in devices {
            if device.serial == expected.serial {
                found = Some(device);
                break;
            }
            debug!(serial = %device.serial, expected = %expected.serial, "Ignoring different device");
        }
        found.ok_or_else(|| PipelineError::DeviceNotFound { serial: expected.serial.clone() })
    }

    fn validate(&self, baseline: &Baseline) -> Validation {
        let mut source = lock_source(&self.source);

        let found = match source.subnet_fingerprint() {
            Ok(found) => found,
            Err(error) => return Validation::Retry(error),
        };
        if found != baseline.fingerprint {
            return Validation::Mismatch(found);
        }

        match source.start_stream() {
            Ok(()) => Validation::Valid,
            Err(error) => Validation::Retry(error),
        }
    }
}

/// Whether `attempts` has used up the reconnect budget. `None` never runs out.
fn budget_spent(attempts: u32, max_attempts: Option<u32>) -> bool {
    max_attempts.is_some_and(|max| attempts >= max)
}
