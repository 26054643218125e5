//! Frame source trait for capture devices

use std::time::Duration;

use crate::Result;
use crate::error::GrabError;
use crate::types::{DeviceDescriptor, DeviceHandle, Frame, SubnetFingerprint};

/// Trait for capture devices feeding the pipeline
///
/// A source wraps a vendor SDK camera handle. The pipeline calls it from two
/// threads, never concurrently: the acquisition worker while the device is
/// connected, and the connectivity monitor while it is not. Implementations
/// only need to be `Send`.
///
/// Blocking calls must honour their timeout so shutdown is never held up by
/// more than one timeout period.
pub trait FrameSource: Send + 'static {
    /// Begin streaming.
    fn start_stream(&mut self) -> Result<()>;

    /// Stop streaming. Must be safe to call on a lost device.
    fn stop_stream(&mut self);

    /// Block for the next frame.
    ///
    /// Returns:
    /// - `Ok(frame)` - a complete frame
    /// - `Err(GrabError::Timeout)` - nothing arrived yet; benign
    /// - `Err(GrabError::DeviceLost)` - transport failure; triggers reconnection
    /// - `Err(GrabError::Incomplete(frame))` - partial frame, still delivered
    fn get_frame(&mut self, timeout: Duration) -> std::result::Result<Frame, GrabError>;

    /// Return a device-owned buffer to the source's pool.
    ///
    /// Only called with frames whose origin is
    /// [`BufferOrigin::Device`](crate::types::BufferOrigin::Device).
    fn requeue(&mut self, frame: Frame);

    /// Cheap connectivity probe.
    fn is_connected(&self) -> bool;

    /// Sweep the network for devices, waiting at most `timeout`.
    fn rediscover(&mut self, timeout: Duration) -> Result<Vec<DeviceDescriptor>>;

    /// Open `device` and make it the active device of this source.
    fn reconnect(&mut self, device: &DeviceDescriptor) -> Result<DeviceHandle>;

    /// Network segment the active device is reachable on.
    fn subnet_fingerprint(&self) -> Result<SubnetFingerprint>;

    /// Descriptor of the active device, used to verify identity across reconnects.
    fn device(&self) -> Result<DeviceDescriptor>;
}
