//! Scripted frame source for tests, benchmarks and demos

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;
use tracing::{debug, trace};

use crate::error::GrabError;
use crate::source::FrameSource;
use crate::types::{BufferOrigin, DeviceDescriptor, DeviceHandle, Frame, FrameStatus, SubnetFingerprint};
use crate::{PipelineError, Result};

/// One scripted event, consumed in order by `get_frame`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    /// Deliver a frame with this id
    Frame(u64),

    /// Deliver a frame with this id, flagged incomplete
    Incomplete(u64),

    /// Report a benign timeout
    Timeout,

    /// Drop the link; `get_frame` reports device loss
    Disconnect,

    /// Drop the link without a transport error; `get_frame` only times out
    /// and `is_connected` turns false
    SilentLoss,
}

/// Devices visible to one successful rediscovery sweep.
#[derive(Debug, Clone)]
struct Reappearance {
    /// Empty sweeps before the devices show up
    misses: u32,
    devices: Vec<DeviceDescriptor>,
}

#[derive(Debug, Default)]
struct ProbeCounters {
    frames_served: AtomicU64,
    requeued: AtomicU64,
    outstanding: AtomicUsize,
    max_outstanding: AtomicUsize,
    start_calls: AtomicU64,
    stop_calls: AtomicU64,
    rediscover_calls: AtomicU64,
    reconnect_calls: AtomicU64,
}

/// Read-only view of a [`SimulatedCamera`]'s counters, usable after the
/// camera has been moved into a pipeline.
#[derive(Debug, Clone)]
pub struct SimulatedProbe {
    counters: Arc<ProbeCounters>,
}

impl SimulatedProbe {
    pub fn frames_served(&self) -> u64 {
        self.counters.frames_served.load(Ordering::SeqCst)
    }

    pub fn buffers_requeued(&self) -> u64 {
        self.counters.requeued.load(Ordering::SeqCst)
    }

    /// Device buffers currently held outside the pool.
    pub fn outstanding_buffers(&self) -> usize {
        self.counters.outstanding.load(Ordering::SeqCst)
    }

    pub fn max_outstanding_buffers(&self) -> usize {
        self.counters.max_outstanding.load(Ordering::SeqCst)
    }

    pub fn start_calls(&self) -> u64 {
        self.counters.start_calls.load(Ordering::SeqCst)
    }

    pub fn stop_calls(&self) -> u64 {
        self.counters.stop_calls.load(Ordering::SeqCst)
    }

    pub fn rediscover_calls(&self) -> u64 {
        self.counters.rediscover_calls.load(Ordering::SeqCst)
    }

    pub fn reconnect_calls(&self) -> u64 {
        self.counters.reconnect_calls.load(Ordering::SeqCst)
    }
}

/// Scripted camera
///
/// Frames come from a fixed buffer pool; every frame handed out occupies a
/// slot until it is requeued. A consumer that forgets to requeue starves the
/// pool and sees only timeouts, like a real GigE driver.
///
/// Idle waits (timeouts, empty sweeps) sleep for at most `idle_wait`
/// regardless of the timeout passed in, so scripted runs stay fast.
pub struct SimulatedCamera {
    device: DeviceDescriptor,
    script: VecDeque<Step>,
    reappearances: VecDeque<Reappearance>,
    visible: Vec<DeviceDescriptor>,
    connected: bool,
    streaming: bool,
    silent: bool,
    free_slots: Vec<usize>,
    payload_len: usize,
    idle_wait: Duration,
    generation: u32,
    counters: Arc<ProbeCounters>,
}

impl SimulatedCamera {
    /// Create a connected camera with an empty script and a 4-slot pool.
    pub fn new(device: DeviceDescriptor) -> Self {
        Self {
            device,
            script: VecDeque::new(),
            reappearances: VecDeque::new(),
            visible: Vec::new(),
            connected: true,
            streaming: false,
            silent: false,
            free_slots: (0..4).rev().collect(),
            payload_len: 64,
            idle_wait: Duration::from_millis(2),
            generation: 1,
            counters: Arc::new(ProbeCounters::default()),
        }
    }

    /// Append one frame step per id.
    pub fn with_frames(mut self, ids: impl IntoIterator<Item = u64>) -> Self {
        self.script.extend(ids.into_iter().map(Step::Frame));
        self
    }

    pub fn with_step(mut self, step: Step) -> Self {
        self.script.push_back(step);
        self
    }

    pub fn then_disconnect(self) -> Self {
        self.with_step(Step::Disconnect)
    }

    /// Make `device` visible after `misses` empty rediscovery sweeps.
    pub fn then_reappear(self, misses: u32, device: DeviceDescriptor) -> Self {
        self.then_reappear_among(misses, vec![device])
    }

    /// Make several devices visible together after `misses` empty sweeps.
    pub fn then_reappear_among(mut self, misses: u32, devices: Vec<DeviceDescriptor>) -> Self {
        self.reappearances.push_back(Reappearance { misses, devices });
        self
    }

    pub fn with_pool_size(mut self, slots: usize) -> Self {
        self.free_slots = (0..slots).rev().collect();
        self
    }

    pub fn with_payload_len(mut self, len: usize) -> Self {
        self.payload_len = len;
        self
    }

    pub fn with_idle_wait(mut self, wait: Duration) -> Self {
        self.idle_wait = wait;
        self
    }

    pub fn probe(&self) -> SimulatedProbe {
        SimulatedProbe { counters: Arc::clone(&self.counters) }
    }

    fn idle(&self, timeout: Duration) {
        std::thread::sleep(timeout.min(self.idle_wait));
    }

    fn lose_link(&mut self) {
        self.connected = false;
        self.streaming = false;
    }

    /// Take a pool slot and build a device frame. `None` when the pool is dry.
    fn allocate(&mut self, id: u64) -> Option<Frame> {
        let slot = self.free_slots.pop()?;
        let outstanding = self.counters.outstanding.fetch_add(1, Ordering::SeqCst) + 1;
        self.counters.max_outstanding.fetch_max(outstanding, Ordering::SeqCst);
        self.counters.frames_served.fetch_add(1, Ordering::SeqCst);

        let timestamp = Duration::from_micros(id.saturating_mul(16_667));
        Some(Frame::device(id, timestamp, vec![(id & 0xFF) as u8; self.payload_len], slot))
    }
}

impl FrameSource for SimulatedCamera {
    fn start_stream(&mut self) -> Result<()> {
        if !self.connected {
            return Err(PipelineError::source_failed("start_stream", "device not connected"));
        }
        self.streaming = true;
        self.counters.start_calls.fetch_add(1, Ordering::SeqCst);
        debug!(serial = %self.device.serial, "Simulated stream started");
        Ok(())
    }

    fn stop_stream(&mut self) {
        self.streaming = false;
        self.counters.stop_calls.fetch_add(1, Ordering::SeqCst);
    }

    fn get_frame(&mut self, timeout: Duration) -> std::result::Result<Frame, GrabError> {
        if !self.connected && !self.silent {
            return Err(GrabError::device_lost("simulated link down"));
        }
        // Silent loss keeps timing out until someone probes the link
        if !self.streaming || self.silent {
            self.idle(timeout);
            return Err(GrabError::Timeout(timeout));
        }

        match self.script.pop_front() {
            Some(Step::Frame(id)) => match self.allocate(id) {
                Some(frame) => Ok(frame),
                None => {
                    trace!(frame_id = id, "Buffer pool starved");
                    self.script.push_front(Step::Frame(id));
                    self.idle(timeout);
                    Err(GrabError::Timeout(timeout))
                }
            },
            Some(Step::Incomplete(id)) => match self.allocate(id) {
                Some(frame) => Err(GrabError::Incomplete(frame.with_status(FrameStatus::Incomplete))),
                None => {
                    self.script.push_front(Step::Incomplete(id));
                    self.idle(timeout);
                    Err(GrabError::Timeout(timeout))
                }
            },
            Some(Step::Disconnect) => {
                self.lose_link();
                Err(GrabError::device_lost("simulated link down"))
            }
            Some(Step::SilentLoss) => {
                self.lose_link();
                self.silent = true;
                self.idle(timeout);
                Err(GrabError::Timeout(timeout))
            }
            Some(Step::Timeout) | None => {
                self.idle(timeout);
                Err(GrabError::Timeout(timeout))
            }
        }
    }

    fn requeue(&mut self, frame: Frame) {
        if let BufferOrigin::Device { slot } = frame.origin() {
            self.free_slots.push(slot);
            self.counters.outstanding.fetch_sub(1, Ordering::SeqCst);
            self.counters.requeued.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    fn rediscover(&mut self, timeout: Duration) -> Result<Vec<DeviceDescriptor>> {
        self.counters.rediscover_calls.fetch_add(1, Ordering::SeqCst);

        if self.connected {
            return Ok(vec![self.device.clone()]);
        }

        match self.reappearances.front_mut() {
            Some(next) if next.misses > 0 => {
                next.misses -= 1;
                self.idle(timeout);
                Ok(Vec::new())
            }
            Some(_) => {
                if let Some(next) = self.reappearances.pop_front() {
                    self.visible = next.devices;
                }
                Ok(self.visible.clone())
            }
            None => {
                self.idle(timeout);
                Ok(Vec::new())
            }
        }
    }

    fn reconnect(&mut self, device: &DeviceDescriptor) -> Result<DeviceHandle> {
        self.counters.reconnect_calls.fetch_add(1, Ordering::SeqCst);

        if !self.visible.contains(device) {
            return Err(PipelineError::source_failed(
                "reconnect",
                format!("device {} is not reachable", device.serial),
            ));
        }

        self.visible.clear();
        self.device = device.clone();
        self.connected = true;
        self.silent = false;
        self.generation += 1;
        debug!(device = %self.device, generation = self.generation, "Simulated device reopened");

        Ok(DeviceHandle { descriptor: self.device.clone(), generation: self.generation })
    }

    fn subnet_fingerprint(&self) -> Result<SubnetFingerprint> {
        if !self.connected {
            return Err(PipelineError::source_failed("subnet_fingerprint", "device not connected"));
        }
        Ok(self.device.fingerprint())
    }

    fn device(&self) -> Result<DeviceDescriptor> {
        Ok(self.device.clone())
    }
}
