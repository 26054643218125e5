//! Connection, monitor and shutdown states

use serde::{Deserialize, Serialize};
use std::fmt;

/// Device availability as seen by the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConnectionState {
    /// Streaming normally
    Connected,

    /// The producer observed device loss and is parked
    Disconnected,

    /// The connectivity monitor is rediscovering and validating the device
    Reconnecting,

    /// The device came back somewhere it must not be used; terminal
    Fatal,
}

impl ConnectionState {
    pub fn is_connected(self) -> bool {
        self == ConnectionState::Connected
    }

    /// Whether the state can be left again.
    pub fn is_terminal(self) -> bool {
        self == ConnectionState::Fatal
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ConnectionState::Connected => "connected",
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Reconnecting => "reconnecting",
            ConnectionState::Fatal => "fatal",
        };
        f.write_str(label)
    }
}

/// Phase of the connectivity monitor's state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MonitorPhase {
    Idle,
    WaitingForDisconnectSignal,
    Rediscovering,
    ValidatingNetwork,
    Fatal,
    /// Thread has returned
    Stopped,
}

impl MonitorPhase {
    /// `Fatal` and `Stopped` are only left by dropping the pipeline.
    pub fn is_final(self) -> bool {
        matches!(self, MonitorPhase::Fatal | MonitorPhase::Stopped)
    }
}

/// Why the pipeline's shutdown signal was raised.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ShutdownReason {
    /// Operator called `stop()` or dropped the pipeline
    Requested,

    /// The acquisition target was reached
    TargetReached,

    /// An irrecoverable error ended the pipeline
    Fatal,
}

impl fmt::Display for ShutdownReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ShutdownReason::Requested => "requested",
            ShutdownReason::TargetReached => "target reached",
            ShutdownReason::Fatal => "fatal error",
        };
        f.write_str(label)
    }
}
