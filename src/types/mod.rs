//! Core types shared by every pipeline stage.
//!
//! - [`Frame`] is the move-only handle that flows from source to sink
//! - [`SubnetFingerprint`] and [`DeviceDescriptor`] identify where and what a
//!   device is, so a reconnect can be validated
//! - [`ConnectionState`], [`MonitorPhase`] and [`ShutdownReason`] describe the
//!   coordination state machine
//!
//! ## Usage Example
//!
//! ```rust
//! use framelink::types::{Frame, SubnetFingerprint};
//! use std::net::Ipv4Addr;
//! use std::time::Duration;
//!
//! let device_frame = Frame::device(1, Duration::from_millis(16), vec![0u8; 64], 0);
//! let copy = device_frame.detach();
//! assert!(!copy.is_device_owned());
//!
//! let segment = SubnetFingerprint::from_prefix(Ipv4Addr::new(192, 168, 1, 40), 24);
//! assert!(segment.contains(Ipv4Addr::new(192, 168, 1, 2)));
//! ```

mod frame;
mod network;
mod state;

pub use frame::{BufferOrigin, Frame, FrameStatus};
pub use network::{DeviceDescriptor, DeviceHandle, SubnetFingerprint};
pub use state::{ConnectionState, MonitorPhase, ShutdownReason};
