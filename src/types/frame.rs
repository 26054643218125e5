//! Frame handles for the acquisition pipeline

use std::fmt;
use std::time::Duration;

/// Where a frame's payload buffer lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BufferOrigin {
    /// Buffer belongs to the source's internal pool and must be requeued.
    Device { slot: usize },

    /// Private heap copy owned by whichever stage holds the frame.
    Private,
}

/// Completeness of a captured frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum FrameStatus {
    #[default]
    Complete,

    /// Transport dropped packets that could not be resent; payload is partial.
    Incomplete,
}

/// One captured buffer of sensor data plus its metadata.
///
/// A `Frame` is move-only: there is no `Clone`. Ownership passes from the
/// source to the acquisition worker, into the queue, out to a consumer and is
/// finally released (dropped, or requeued when the buffer is device-owned).
/// [`Frame::detach`] is the only way to produce a second frame from the same
/// payload, and it always yields a [`BufferOrigin::Private`] copy.
pub struct Frame {
    id: u64,
    timestamp: Duration,
    payload: Vec<u8>,
    status: FrameStatus,
    origin: BufferOrigin,
}

impl Frame {
    /// Create a frame backed by a device pool slot.
    pub fn device(id: u64, timestamp: Duration, payload: Vec<u8>, slot: usize) -> Self {
        Self {
            id,
            timestamp,
            payload,
            status: FrameStatus::Complete,
            origin: BufferOrigin::Device { slot },
        }
    }

    /// Create a privately owned frame.
    pub fn private(id: u64, timestamp: Duration, payload: Vec<u8>) -> Self {
        Self { id, timestamp, payload, status: FrameStatus::Complete, origin: BufferOrigin::Private }
    }

    /// Sequence number assigned by the device.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Capture timestamp, relative to the device clock epoch.
    pub fn timestamp(&self) -> Duration {
        self.timestamp
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    pub fn payload_size(&self) -> usize {
        self.payload.len()
    }

    pub fn status(&self) -> FrameStatus {
        self.status
    }

    pub fn is_complete(&self) -> bool {
        self.status == FrameStatus::Complete
    }

    pub fn origin(&self) -> BufferOrigin {
        self.origin
    }

    /// Whether the buffer must go back to the source pool.
    pub fn is_device_owned(&self) -> bool {
        matches!(self.origin, BufferOrigin::Device { .. })
    }

    /// Flag the frame as incomplete.
    pub fn mark_incomplete(&mut self) {
        self.status = FrameStatus::Incomplete;
    }

    /// Builder-style variant of [`Frame::mark_incomplete`].
    pub fn with_status(mut self, status: FrameStatus) -> Self {
        self.status = status;
        self
    }

    /// Copy the payload and metadata into a private frame.
    ///
    /// The original keeps its origin so it can still be requeued.
    pub fn detach(&self) -> Frame {
        Frame {
            id: self.id,
            timestamp: self.timestamp,
            payload: self.payload.clone(),
            status: self.status,
            origin: BufferOrigin::Private,
        }
    }

    /// Consume the frame and return its payload.
    pub fn into_payload(self) -> Vec<u8> {
        self.payload
    }
}

impl fmt::Debug for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Payload omitted, frames can be megabytes
        f.debug_struct("Frame")
            .field("id", &self.id)
            .field("timestamp", &self.timestamp)
            .field("payload_size", &self.payload.len())
            .field("status", &self.status)
            .field("origin", &self.origin)
            .finish()
    }
}
