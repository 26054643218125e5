//! Test utilities shared by unit tests, integration tests and benchmarks

#![cfg(any(test, feature = "benchmark"))]

use std::collections::HashSet;
use std::net::Ipv4Addr;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::PoisonError;

use crate::config::PipelineConfig;
use crate::sink::Sink;
use crate::types::{DeviceDescriptor, Frame};

/// Build a device on `192.168.<subnet>.0/24`.
pub fn test_device(serial: &str, subnet: u8) -> DeviceDescriptor {
    DeviceDescriptor::new(
        serial,
        "SimCam-2MP",
        Ipv4Addr::new(192, 168, subnet, 40),
        Ipv4Addr::new(255, 255, 255, 0),
    )
}

/// Configuration with short timeouts so scripted scenarios finish quickly.
pub fn fast_config() -> PipelineConfig {
    PipelineConfig {
        frame_timeout_ms: 5,
        timeouts_before_probe: 3,
        discovery_timeout_ms: 5,
        reconnect_backoff_ms: 2,
        ..Default::default()
    }
}

/// Install a test subscriber once; later calls are no-ops.
pub fn init_test_logging() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

/// Sink that records every frame id it sees.
///
/// Ids listed with [`RecordingSink::failing_on`] are recorded and then
/// rejected with an error.
#[derive(Debug, Default)]
pub struct RecordingSink {
    ids: Mutex<Vec<u64>>,
    failing: HashSet<u64>,
    incomplete: AtomicU64,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_on(ids: impl IntoIterator<Item = u64>) -> Self {
        Self { failing: ids.into_iter().collect(), ..Self::default() }
    }

    /// Ids in the order the sink received them.
    pub fn ids(&self) -> Vec<u64> {
        self.ids.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn incomplete(&self) -> u64 {
        self.incomplete.load(Ordering::SeqCst)
    }
}

impl Sink for RecordingSink {
    fn process(&self, frame: Frame) -> anyhow::Result<()> {
        assert!(!frame.is_device_owned(), "sink received a device buffer");
        if !frame.is_complete() {
            self.incomplete.fetch_add(1, Ordering::SeqCst);
        }
        self.ids.lock().unwrap_or_else(PoisonError::into_inner).push(frame.id());

        if self.failing.contains(&frame.id()) {
            anyhow::bail!("rejected frame {}", frame.id());
        }
        Ok(())
    }
}
