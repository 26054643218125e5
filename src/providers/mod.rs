//! Frame source implementations
//!
//! Vendor SDK bindings implement [`FrameSource`](crate::FrameSource) outside
//! this crate. The simulated camera drives tests, benchmarks and demos.

pub mod simulated;

pub use simulated::{SimulatedCamera, SimulatedProbe, Step};
