//! Fault-tolerant frame acquisition for network cameras.
//!
//! Framelink streams frames from a [`FrameSource`] (typically a GigE Vision
//! camera behind a vendor SDK) into a [`Sink`] through a producer/consumer
//! queue, and keeps the stream alive across transient link loss.
//!
//! # Features
//!
//! - **Decoupled threads**: acquisition never waits on processing
//! - **Reconnection**: a monitor thread rediscovers and reopens a lost device
//! - **Network safety**: a device that returns on a different subnet is fatal
//! - **Prompt shutdown**: one signal releases every blocked thread
//!
//! # Quick Start
//!
//! ```rust
//! use framelink::providers::SimulatedCamera;
//! use framelink::types::DeviceDescriptor;
//! use framelink::{DiscardSink, Pipeline, PipelineConfig, ShutdownReason};
//! use std::net::Ipv4Addr;
//!
//! # fn main() -> framelink::Result<()> {
//! let device = DeviceDescriptor::new(
//!     "SN-1", "GigE-5MP", Ipv4Addr::new(10, 0, 4, 2), Ipv4Addr::new(255, 255, 255, 0),
//! );
//! let camera = SimulatedCamera::new(device).with_frames(1..=100);
//! let config = PipelineConfig { frame_target: Some(100), ..Default::default() };
//!
//! let report = Pipeline::start(camera, DiscardSink, config)?.join()?;
//! assert_eq!(report.reason, ShutdownReason::TargetReached);
//! # Ok(())
//! # }
//! ```

// Core types and error handling
pub mod config;
mod error;
pub mod logging;
#[cfg(any(test, feature = "benchmark"))]
pub mod test_utils;
pub mod types;

// Pipeline building blocks
pub mod queue;
pub mod sink;
pub mod source;
pub mod stats;

// Threads and coordination
mod coordinator;
mod driver;
pub mod pipeline;
mod workers;

// Source implementations
pub mod providers;

// Core exports
pub use config::PipelineConfig;
pub use error::*;
pub use logging::init_logging;
pub use types::*;

// Pipeline exports
pub use pipeline::{Pipeline, PipelineReport, ShutdownHandle};
pub use queue::{FrameQueue, QueueClosed};
pub use sink::{DiscardSink, Sink};
pub use source::FrameSource;
pub use stats::PipelineStats;
