//! Error types for the acquisition pipeline.
//!
//! Errors fall into three groups, and the pipeline treats each group
//! differently:
//!
//! - **Per-frame**: incomplete frames and sink failures. Absorbed and logged
//!   where they happen; streaming continues.
//! - **Connection-level**: device loss and timeouts. These drive the
//!   connection state machine and are retried.
//! - **Fatal**: a device that reappears on a different network segment, or a
//!   reconnect budget that runs out. These raise the shutdown signal and are
//!   returned from [`Pipeline::join`](crate::Pipeline::join).
//!
//! ## Recovery and Retry
//!
//! ```rust
//! use framelink::PipelineError;
//!
//! let error = PipelineError::device_lost("GVCP heartbeat expired");
//! assert!(error.is_retryable());
//! assert!(!error.is_fatal());
//! for suggestion in error.recovery_suggestions() {
//!     println!("  - {}", suggestion);
//! }
//! ```

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

use crate::types::{Frame, SubnetFingerprint};

/// Result type alias for pipeline operations.
pub type Result<T, E = PipelineError> = std::result::Result<T, E>;

/// Main error type for pipeline operations.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum PipelineError {
    #[error("Frame source {operation} failed: {reason}")]
    Source {
        operation: String,
        reason: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Device lost: {reason}")]
    DeviceLost { reason: String },

    #[error("Operation timed out after {duration:?}")]
    Timeout { duration: Duration },

    #[error("Device reappeared on subnet {found}, expected {expected}")]
    SubnetMismatch { expected: SubnetFingerprint, found: SubnetFingerprint },

    #[error("No device with serial {serial} found during rediscovery")]
    DeviceNotFound { serial: String },

    #[error("Reconnect abandoned after {attempts} attempts")]
    ReconnectExhausted { attempts: u32 },

    #[error("Frame queue is closed")]
    QueueClosed,

    #[error("Invalid configuration: {reason}")]
    Config { reason: String },

    #[error("Parse error in {context}: {details}")]
    Parse { context: String, details: String },

    #[error("Configuration file error: {path}")]
    File {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to spawn {name} thread")]
    ThreadSpawn {
        name: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Thread {name} panicked")]
    ThreadPanicked { name: String },
}

impl PipelineError {
    /// Returns whether this error is potentially recoverable through retry.
    pub fn is_retryable(&self) -> bool {
        match self {
            PipelineError::Source { .. } => true,
            PipelineError::DeviceLost { .. } => true,
            PipelineError::Timeout { .. } => true,
            PipelineError::DeviceNotFound { .. } => true,
            PipelineError::SubnetMismatch { .. } => false,
            PipelineError::ReconnectExhausted { .. } => false,
            PipelineError::QueueClosed => false,
            PipelineError::Config { .. } => false,
            PipelineError::Parse { .. } => false,
            PipelineError::File { .. } => false,
            PipelineError::ThreadSpawn { .. } => false,
            PipelineError::ThreadPanicked { .. } => false,
        }
    }

    /// Returns whether this error ends the pipeline when raised mid-stream.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            PipelineError::SubnetMismatch { .. }
                | PipelineError::ReconnectExhausted { .. }
                | PipelineError::ThreadPanicked { .. }
        )
    }

    /// Returns suggested recovery actions for this error.
    pub fn recovery_suggestions(&self) -> Vec<&'static str> {
        match self {
            PipelineError::Source { .. } => vec![
                "Check the camera is powered and its link LED is lit",
                "Verify no other application holds the control channel",
                "Retry the operation",
            ],
            PipelineError::DeviceLost { .. } => vec![
                "Check cabling and switch ports between host and camera",
                "Increase the device heartbeat timeout",
                "Wait for automatic reconnection",
            ],
            PipelineError::Timeout { .. } => vec![
                "Increase the frame timeout",
                "Check the trigger source is firing",
                "Verify the configured frame rate",
            ],
            PipelineError::SubnetMismatch { .. } => vec![
                "Check DHCP or persistent IP settings on the camera",
                "Verify the host NIC configuration was not changed",
                "Restart acquisition after confirming the network layout",
            ],
            PipelineError::DeviceNotFound { .. } => vec![
                "Confirm the original camera is still connected",
                "Disable device identity checks if a replacement is intended",
            ],
            PipelineError::ReconnectExhausted { .. } => vec![
                "Raise max_reconnect_attempts or leave it unset",
                "Inspect the camera for hardware faults",
            ],
            PipelineError::QueueClosed => vec!["Start a new pipeline; a closed queue never reopens"],
            PipelineError::Config { .. } => vec![
                "Check configuration values against the documented ranges",
                "Remove unknown keys from the configuration file",
            ],
            PipelineError::Parse { .. } => vec![
                "Check the YAML syntax of the configuration",
                "Verify field types match the documentation",
            ],
            PipelineError::File { .. } => vec![
                "Check the file exists and is readable",
                "Check file permissions",
            ],
            PipelineError::ThreadSpawn { .. } => vec![
                "Check process thread limits",
                "Reduce the number of consumers",
            ],
            PipelineError::ThreadPanicked { .. } => vec![
                "Inspect logs for the panic message",
                "Check sink and source implementations for panics",
            ],
        }
    }

    /// Helper constructor for frame source failures.
    pub fn source_failed(operation: impl Into<String>, reason: impl Into<String>) -> Self {
        PipelineError::Source { operation: operation.into(), reason: reason.into(), source: None }
    }

    /// Helper constructor for frame source failures with an underlying cause.
    pub fn source_failed_with_source(
        operation: impl Into<String>,
        reason: impl Into<String>,
        source: Box<dyn std::error::Error + Send + Sync>,
    ) -> Self {
        PipelineError::Source {
            operation: operation.into(),
            reason: reason.into(),
            source: Some(source),
        }
    }

    /// Helper constructor for device loss.
    pub fn device_lost(reason: impl Into<String>) -> Self {
        PipelineError::DeviceLost { reason: reason.into() }
    }

    /// Helper constructor for configuration errors.
    pub fn config_invalid(reason: impl Into<String>) -> Self {
        PipelineError::Config { reason: reason.into() }
    }

    /// Helper constructor for file errors with path context.
    pub fn file_error(path: PathBuf, source: std::io::Error) -> Self {
        PipelineError::File { path, source }
    }
}

impl From<std::io::Error> for PipelineError {
    fn from(err: std::io::Error) -> Self {
        PipelineError::File { path: PathBuf::from("<unknown>"), source: err }
    }
}

impl From<serde_yaml_ng::Error> for PipelineError {
    fn from(err: serde_yaml_ng::Error) -> Self {
        PipelineError::Parse { context: "pipeline configuration".to_string(), details: err.to_string() }
    }
}

/// Failure modes of a single `get_frame` call.
#[derive(Error, Debug)]
pub enum GrabError {
    /// No frame arrived within the timeout. Benign.
    #[error("no frame within {0:?}")]
    Timeout(Duration),

    /// Transport-level failure: the device is gone.
    #[error("device lost: {reason}")]
    DeviceLost { reason: String },

    /// A frame arrived with missing packets. It is still delivered, flagged.
    #[error("incomplete frame {}", .0.id())]
    Incomplete(Frame),
}

impl GrabError {
    pub fn device_lost(reason: impl Into<String>) -> Self {
        GrabError::DeviceLost { reason: reason.into() }
    }

    /// Whether this failure means the device is gone.
    ///
    /// Only transport failures count. Timeouts and incomplete frames must
    /// never trigger reconnection.
    pub fn is_device_loss(&self) -> bool {
        matches!(self, GrabError::DeviceLost { .. })
    }
}
