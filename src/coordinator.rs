//! Shared coordination state for the pipeline threads
//!
//! All connection state, the monitor phase and the shutdown signal live under
//! one mutex with a single "state changed" condition variable. Every wait in
//! the pipeline is expressed as "until predicate or shutdown", so raising the
//! shutdown signal is always enough to release every thread.

use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::PipelineError;
use crate::queue::FrameQueue;
use crate::stats::StatsRecorder;
use crate::types::{ConnectionState, DeviceDescriptor, MonitorPhase, ShutdownReason, SubnetFingerprint};

/// Device identity captured when streaming started.
#[derive(Debug, Clone)]
pub(crate) struct Baseline {
    pub fingerprint: SubnetFingerprint,
    pub device: DeviceDescriptor,
}

#[derive(Debug)]
struct Control {
    connection: ConnectionState,
    phase: MonitorPhase,
    shutdown: Option<ShutdownReason>,
    fatal: Option<PipelineError>,
}

pub(crate) struct Coordinator {
    control: Mutex<Control>,
    changed: Condvar,
    queue: Arc<FrameQueue>,
    baseline: Baseline,
    stats: StatsRecorder,
    state_tx: watch::Sender<ConnectionState>,
}

impl Coordinator {
    pub fn new(queue: Arc<FrameQueue>, baseline: Baseline) -> Self {
        let (state_tx, _) = watch::channel(ConnectionState::Connected);
        Self {
            control: Mutex::new(Control {
                connection: ConnectionState::Connected,
                phase: MonitorPhase::Idle,
                shutdown: None,
                fatal: None,
            }),
            changed: Condvar::new(),
            queue,
            baseline,
            stats: StatsRecorder::default(),
            state_tx,
        }
    }

    pub fn queue(&self) -> &FrameQueue {
        &self.queue
    }

    pub fn baseline(&self) -> &Baseline {
        &self.baseline
    }

    pub fn stats(&self) -> &StatsRecorder {
        &self.stats
    }

    pub fn subscribe(&self) -> watch::Receiver<ConnectionState> {
        self.state_tx.subscribe()
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.lock().connection
    }

    pub fn monitor_phase(&self) -> MonitorPhase {
        self.lock().phase
    }

    pub fn shutdown_reason(&self) -> Option<ShutdownReason> {
        self.lock().shutdown
    }

    pub fn is_shutdown(&self) -> bool {
        self.lock().shutdown.is_some()
    }

    /// Producer side: record device loss and wake the monitor.
    ///
    /// Returns `true` if this call moved the state out of `Connected`.
    pub fn report_device_lost(&self, reason: &str) -> bool {
        let mut control = self.lock();
        if control.connection != ConnectionState::Connected || control.shutdown.is_some() {
            return false;
        }

        warn!(reason, "Device lost, suspending acquisition");
        StatsRecorder::bump(&self.stats.disconnects);
        self.transition(&mut control, ConnectionState::Disconnected);
        drop(control);

        self.changed.notify_all();
        true
    }

    /// Producer side: block until the device is connected again.
    ///
    /// Returns `false` if shutdown was raised instead.
    pub fn wait_for_connection(&self) -> bool {
        let control = self.lock();
        let control = self
            .changed
            .wait_while(control, |c| c.shutdown.is_none() && c.connection != ConnectionState::Connected)
            .unwrap_or_else(PoisonError::into_inner);
        control.shutdown.is_none()
    }

    /// Monitor side: block until the producer reports a disconnect.
    ///
    /// Returns `false` if shutdown was raised instead.
    pub fn wait_for_disconnect(&self) -> bool {
        let mut control = self.lock();
        if !control.phase.is_final() {
            control.phase = MonitorPhase::WaitingForDisconnectSignal;
        }
        let control = self
            .changed
            .wait_while(control, |c| c.shutdown.is_none() && c.connection == ConnectionState::Connected)
            .unwrap_or_else(PoisonError::into_inner);
        control.shutdown.is_none()
    }

    /// Monitor side: enter a rediscovery cycle.
    pub fn begin_reconnect(&self) {
        let mut control = self.lock();
        if !control.phase.is_final() {
            control.phase = MonitorPhase::Rediscovering;
        }
        StatsRecorder::bump(&self.stats.rediscovery_cycles);
        self.transition(&mut control, ConnectionState::Reconnecting);
        drop(control);
        self.changed.notify_all();
    }

    pub fn set_phase(&self, phase: MonitorPhase) {
        let mut control = self.lock();
        if !control.phase.is_final() {
            control.phase = phase;
        }
    }

    /// Monitor side: the device is back and validated; resume the producer.
    pub fn restore_connection(&self) -> bool {
        let mut control = self.lock();
        if control.shutdown.is_some() {
            return false;
        }

        control.phase = MonitorPhase::WaitingForDisconnectSignal;
        StatsRecorder::bump(&self.stats.reconnects);
        self.transition(&mut control, ConnectionState::Connected);
        drop(control);

        info!("Device reconnected, resuming acquisition");
        self.changed.notify_all();
        true
    }

    /// Raise the shutdown signal. The first reason wins.
    ///
    /// Returns `true` if this call set the signal.
    pub fn shutdown(&self, reason: ShutdownReason) -> bool {
        let mut control = self.lock();
        if control.shutdown.is_some() {
            return false;
        }
        control.shutdown = Some(reason);
        drop(control);

        info!(%reason, "Shutdown signalled");
        self.queue.close();
        self.changed.notify_all();
        true
    }

    /// Monitor side: the device can no longer be used.
    ///
    /// Moves the connection and monitor phase to `Fatal`, then aborts.
    pub fn fail(&self, error: PipelineError) {
        let mut control = self.lock();
        control.phase = MonitorPhase::Fatal;
        self.transition(&mut control, ConnectionState::Fatal);
        self.abort_locked(control, error);
    }

    /// Record an irrecoverable error and shut the pipeline down.
    ///
    /// Connection state and monitor phase are left untouched.
    pub fn abort(&self, error: PipelineError) {
        let control = self.lock();
        self.abort_locked(control, error);
    }

    fn abort_locked(&self, mut control: MutexGuard<'_, Control>, error: PipelineError) {
        error!(%error, "Pipeline failed");
        if control.fatal.is_none() {
            control.fatal = Some(error);
        }
        let newly_set = control.shutdown.is_none();
        if newly_set {
            control.shutdown = Some(ShutdownReason::Fatal);
        }
        drop(control);

        if newly_set {
            self.queue.close();
        }
        self.changed.notify_all();
    }

    /// Mark the monitor thread as gone.
    pub fn monitor_stopped(&self) {
        let mut control = self.lock();
        if !control.phase.is_final() {
            control.phase = MonitorPhase::Stopped;
        }
        debug!(phase = ?control.phase, "Connectivity monitor exited");
    }

    /// Sleep for `duration`, waking early on shutdown.
    ///
    /// Returns `false` if shutdown was raised.
    pub fn pause(&self, duration: Duration) -> bool {
        let control = self.lock();
        let (control, _) = self
            .changed
            .wait_timeout_while(control, duration, |c| c.shutdown.is_none())
            .unwrap_or_else(PoisonError::into_inner);
        control.shutdown.is_none()
    }

    pub fn take_fatal(&self) -> Option<PipelineError> {
        self.lock().fatal.take()
    }

    fn transition(&self, control: &mut Control, next: ConnectionState) {
        if control.connection == next || control.connection.is_terminal() {
            return;
        }
        debug!(from = %control.connection, to = %next, "Connection state change");
        control.connection = next;
        self.state_tx.send_replace(next);
    }

    fn lock(&self) -> MutexGuard<'_, Control> {
        self.control.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
