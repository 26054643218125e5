//! Scenario tests for the running pipeline
//!
//! Each scenario scripts a simulated camera, runs the full thread set and
//! checks what reached the sink plus the final state.

use super::*;
use crate::providers::{SimulatedCamera, Step};
use crate::test_utils::{RecordingSink, fast_config, init_test_logging, test_device};
use futures::StreamExt;
use std::thread;
use std::time::{Duration, Instant};
use tracing::info;

const DEADLINE: Duration = Duration::from_secs(5);

/// Poll `condition` until it holds or the deadline passes.
fn wait_until(mut condition: impl FnMut() -> bool) -> bool {
    let started = Instant::now();
    while started.elapsed() < DEADLINE {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(1));
    }
    false
}

fn with_target(target: u64) -> PipelineConfig {
    PipelineConfig { frame_target: Some(target), ..fast_config() }
}

#[test]
fn delivers_frames_in_order_and_stops_at_target() {
    init_test_logging();
    let camera = SimulatedCamera::new(test_device("SN-1", 1)).with_frames(1..=10);
    let probe = camera.probe();
    let sink = Arc::new(RecordingSink::new());

    let pipeline = Pipeline::start(camera, Arc::clone(&sink), with_target(10)).unwrap();
    let report = pipeline.join().unwrap();

    assert_eq!(report.reason, ShutdownReason::TargetReached);
    assert_eq!(sink.ids(), (1..=10).collect::<Vec<_>>());
    assert_eq!(report.stats.frames_enqueued, 10);
    assert_eq!(report.stats.frames_processed, 10);
    assert_eq!(report.stats.sequence_gaps, 0);
    assert_eq!(probe.start_calls(), 1);
    assert_eq!(probe.stop_calls(), 1);
}

#[test]
fn reconnects_to_same_subnet_and_resumes() {
    init_test_logging();
    let device = test_device("SN-1", 1);
    let camera = SimulatedCamera::new(device.clone())
        .with_frames([1, 2, 3])
        .then_disconnect()
        .then_reappear(1, device.clone())
        .with_frames([4, 5]);
    let probe = camera.probe();
    let sink = Arc::new(RecordingSink::new());

    let pipeline = Pipeline::start(camera, Arc::clone(&sink), with_target(5)).unwrap();
    assert_eq!(pipeline.subnet_fingerprint(), device.fingerprint());

    let report = pipeline.join().unwrap();
    info!(?report, "Reconnect scenario finished");

    assert_eq!(sink.ids(), vec![1, 2, 3, 4, 5]);
    assert_eq!(report.reason, ShutdownReason::TargetReached);
    assert_eq!(report.stats.disconnects, 1);
    assert_eq!(report.stats.reconnects, 1);
    assert_eq!(report.stats.rediscovery_cycles, 1);
    assert_eq!(report.stats.rediscovery_attempts, 2);
    assert_eq!(probe.start_calls(), 2);
}

#[test]
fn subnet_change_is_fatal() {
    init_test_logging();
    let camera = SimulatedCamera::new(test_device("SN-1", 1))
        .with_frames([1, 2, 3])
        .then_disconnect()
        .then_reappear(0, test_device("SN-1", 2))
        .with_frames([4, 5]);
    let probe = camera.probe();
    let sink = Arc::new(RecordingSink::new());

    let pipeline = Pipeline::start(camera, Arc::clone(&sink), fast_config()).unwrap();
    assert!(wait_until(|| pipeline.is_shutdown()));
    assert!(wait_until(|| pipeline.monitor_phase() == MonitorPhase::Fatal));

    assert_eq!(pipeline.connection_state(), ConnectionState::Fatal);
    assert_eq!(pipeline.shutdown_reason(), Some(ShutdownReason::Fatal));

    let err = pipeline.join().unwrap_err();
    match err {
        PipelineError::SubnetMismatch { expected, found } => {
            assert_eq!(expected.to_string(), "192.168.1.0/24");
            assert_eq!(found.to_string(), "192.168.2.0/24");
        }
        other => panic!("expected subnet mismatch, got {other:?}"),
    }
    assert_eq!(probe.rediscover_calls(), 1);
    assert_eq!(probe.reconnect_calls(), 1);
    assert_eq!(sink.ids(), vec![1, 2, 3]);
}

#[test]
fn survives_repeated_disconnects() {
    init_test_logging();
    const CYCLES: u64 = 4;
    let device = test_device("SN-7", 3);

    let mut camera = SimulatedCamera::new(device.clone()).with_frames([1, 2]);
    for cycle in 1..=CYCLES {
        camera = camera
            .then_disconnect()
            .then_reappear((cycle % 3) as u32, device.clone())
            .with_frames([cycle * 2 + 1, cycle * 2 + 2]);
    }
    let total = (CYCLES + 1) * 2;
    let sink = Arc::new(RecordingSink::new());

    let report = Pipeline::start(camera, Arc::clone(&sink), with_target(total))
        .unwrap()
        .join()
        .unwrap();

    assert_eq!(sink.ids(), (1..=total).collect::<Vec<_>>());
    assert_eq!(report.stats.disconnects, CYCLES);
    assert_eq!(report.stats.reconnects, CYCLES);
    assert_eq!(report.stats.rediscovery_cycles, CYCLES);
}

#[test]
fn stop_with_no_frames_returns_promptly() {
    init_test_logging();
    let camera = SimulatedCamera::new(test_device("SN-1", 1));
    let pipeline = Pipeline::start(camera, RecordingSink::new(), fast_config()).unwrap();

    thread::sleep(Duration::from_millis(20));
    let started = Instant::now();
    assert!(pipeline.stop());
    assert!(!pipeline.stop());
    let report = pipeline.join().unwrap();

    assert!(started.elapsed() < Duration::from_secs(1));
    assert_eq!(report.reason, ShutdownReason::Requested);
    assert_eq!(report.stats.frames_processed, 0);
    assert!(report.stats.timeouts > 0);
}

#[test]
fn stop_during_rediscovery_returns_promptly() {
    init_test_logging();
    let camera = SimulatedCamera::new(test_device("SN-1", 1))
        .with_frames([1])
        .then_disconnect();
    let config = PipelineConfig { reconnect_backoff_ms: 10_000, ..fast_config() };
    let pipeline = Pipeline::start(camera, RecordingSink::new(), config).unwrap();

    assert!(wait_until(|| pipeline.connection_state() == ConnectionState::Reconnecting));
    assert!(wait_until(|| pipeline.stats().rediscovery_attempts >= 1));

    let started = Instant::now();
    pipeline.stop();
    let report = pipeline.join().unwrap();

    assert!(started.elapsed() < Duration::from_secs(1));
    assert_eq!(report.reason, ShutdownReason::Requested);
    assert_eq!(report.stats.reconnects, 0);
}

#[test]
fn ignores_a_different_device_on_the_same_subnet() {
    init_test_logging();
    let device = test_device("SN-1", 1);
    let camera = SimulatedCamera::new(device.clone())
        .with_frames([1, 2, 3])
        .then_disconnect()
        .then_reappear(0, test_device("SN-9", 1))
        .then_reappear(0, device.clone())
        .with_frames([4, 5]);
    let probe = camera.probe();
    let sink = Arc::new(RecordingSink::new());

    let report = Pipeline::start(camera, Arc::clone(&sink), with_target(5))
        .unwrap()
        .join()
        .unwrap();

    assert_eq!(sink.ids(), vec![1, 2, 3, 4, 5]);
    assert_eq!(probe.reconnect_calls(), 1);
    assert_eq!(report.stats.rediscovery_attempts, 2);
}

#[test]
fn accepts_replacement_device_when_identity_not_required() {
    init_test_logging();
    let camera = SimulatedCamera::new(test_device("SN-1", 1))
        .with_frames([1, 2])
        .then_disconnect()
        .then_reappear(0, test_device("SN-2", 1))
        .with_frames([3, 4]);
    let sink = Arc::new(RecordingSink::new());
    let config = PipelineConfig { require_same_device: false, ..with_target(4) };

    let pipeline = Pipeline::start(camera, Arc::clone(&sink), config).unwrap();
    assert_eq!(pipeline.device().serial, "SN-1");
    let report = pipeline.join().unwrap();

    assert_eq!(sink.ids(), vec![1, 2, 3, 4]);
    assert_eq!(report.stats.reconnects, 1);
}

#[test]
fn silent_loss_is_detected_by_timeout_streak() {
    init_test_logging();
    let device = test_device("SN-1", 1);
    let camera = SimulatedCamera::new(device.clone())
        .with_frames([1, 2])
        .with_step(Step::SilentLoss)
        .then_reappear(0, device)
        .with_frames([3, 4]);
    let sink = Arc::new(RecordingSink::new());

    let report = Pipeline::start(camera, Arc::clone(&sink), with_target(4))
        .unwrap()
        .join()
        .unwrap();

    assert_eq!(sink.ids(), vec![1, 2, 3, 4]);
    assert_eq!(report.stats.disconnects, 1);
    assert!(report.stats.timeouts >= 3);
}

#[test]
fn incomplete_frames_are_delivered_flagged() {
    init_test_logging();
    let camera = SimulatedCamera::new(test_device("SN-1", 1))
        .with_frames([1])
        .with_step(Step::Incomplete(2))
        .with_frames([3]);
    let sink = Arc::new(RecordingSink::new());

    let report = Pipeline::start(camera, Arc::clone(&sink), with_target(3))
        .unwrap()
        .join()
        .unwrap();

    assert_eq!(sink.ids(), vec![1, 2, 3]);
    assert_eq!(sink.incomplete(), 1);
    assert_eq!(report.stats.frames_incomplete, 1);
}

#[test]
fn sink_errors_do_not_stop_the_pipeline() {
    init_test_logging();
    let camera = SimulatedCamera::new(test_device("SN-1", 1)).with_frames(1..=4);
    let sink = Arc::new(RecordingSink::failing_on([2]));

    let report = Pipeline::start(camera, Arc::clone(&sink), with_target(4))
        .unwrap()
        .join()
        .unwrap();

    assert_eq!(sink.ids(), vec![1, 2, 3, 4]);
    assert_eq!(report.stats.frames_failed, 1);
    assert_eq!(report.stats.frames_processed, 3);
    assert_eq!(report.stats.frames_delivered(), 4);
}

#[test]
fn device_buffers_are_returned_immediately() {
    init_test_logging();
    let camera = SimulatedCamera::new(test_device("SN-1", 1))
        .with_pool_size(2)
        .with_frames(1..=50);
    let probe = camera.probe();

    let report = Pipeline::start(camera, RecordingSink::new(), with_target(50))
        .unwrap()
        .join()
        .unwrap();

    assert_eq!(probe.outstanding_buffers(), 0);
    assert!(probe.max_outstanding_buffers() <= 1);
    assert_eq!(probe.buffers_requeued(), 50);
    assert_eq!(report.stats.buffers_requeued, 50);
}

#[test]
fn gives_up_after_attempt_budget() {
    init_test_logging();
    let camera = SimulatedCamera::new(test_device("SN-1", 1))
        .with_frames([1])
        .then_disconnect();
    let probe = camera.probe();
    let config = PipelineConfig { max_reconnect_attempts: Some(3), ..fast_config() };

    let err = Pipeline::start(camera, RecordingSink::new(), config)
        .unwrap()
        .join()
        .unwrap_err();

    assert!(matches!(err, PipelineError::ReconnectExhausted { attempts: 3 }));
    assert!(err.is_fatal());
    assert_eq!(probe.rediscover_calls(), 3);
}

#[test]
fn multiple_consumers_process_every_frame_once() {
    init_test_logging();
    let camera = SimulatedCamera::new(test_device("SN-1", 1)).with_frames(1..=200);
    let sink = Arc::new(RecordingSink::new());
    let config = PipelineConfig { consumers: 4, ..with_target(200) };

    let report = Pipeline::start(camera, Arc::clone(&sink), config).unwrap().join().unwrap();

    let mut ids = sink.ids();
    ids.sort_unstable();
    assert_eq!(ids, (1..=200).collect::<Vec<_>>());
    assert_eq!(report.stats.frames_processed, 200);
}

#[test]
fn bounded_queue_applies_backpressure_without_loss() {
    init_test_logging();
    let camera = SimulatedCamera::new(test_device("SN-1", 1)).with_frames(1..=20);
    let seen = Arc::new(RecordingSink::new());
    let slow = {
        let seen = Arc::clone(&seen);
        move |frame: crate::types::Frame| {
            thread::sleep(Duration::from_millis(1));
            seen.process(frame)
        }
    };
    let config = PipelineConfig { queue_capacity: Some(2), ..with_target(20) };

    let pipeline = Pipeline::start(camera, slow, config).unwrap();
    assert!(pipeline.queue_len() <= 2);
    pipeline.join().unwrap();

    assert_eq!(seen.ids(), (1..=20).collect::<Vec<_>>());
}

#[test]
fn panicking_sink_fails_pipeline_without_blaming_the_device() {
    init_test_logging();
    let camera = SimulatedCamera::new(test_device("SN-1", 1)).with_frames(1..=5);
    let sink = |frame: crate::types::Frame| -> anyhow::Result<()> {
        if frame.id() == 2 {
            panic!("sink bug on frame {}", frame.id());
        }
        Ok(())
    };

    let pipeline = Pipeline::start(camera, sink, fast_config()).unwrap();
    assert!(wait_until(|| pipeline.is_shutdown()));
    assert!(wait_until(|| pipeline.monitor_phase() == MonitorPhase::Stopped));

    assert_eq!(pipeline.shutdown_reason(), Some(ShutdownReason::Fatal));
    assert_eq!(pipeline.connection_state(), ConnectionState::Connected);
    assert_eq!(pipeline.stats().disconnects, 0);

    let started = Instant::now();
    let err = pipeline.join().unwrap_err();
    assert!(started.elapsed() < Duration::from_secs(1));
    match err {
        PipelineError::ThreadPanicked { name } => assert_eq!(name, "consumer-0"),
        other => panic!("expected thread panic, got {other:?}"),
    }
}

#[test]
fn invalid_config_is_rejected_before_streaming() {
    let camera = SimulatedCamera::new(test_device("SN-1", 1));
    let probe = camera.probe();
    let config = PipelineConfig { consumers: 0, ..fast_config() };

    let result = Pipeline::start(camera, RecordingSink::new(), config);
    assert!(matches!(result, Err(PipelineError::Config { .. })));
    assert_eq!(probe.start_calls(), 0);
}

#[test]
fn shutdown_handle_stops_from_another_thread() {
    init_test_logging();
    let camera = SimulatedCamera::new(test_device("SN-1", 1));
    let pipeline = Pipeline::start(camera, RecordingSink::new(), fast_config()).unwrap();
    let handle = pipeline.shutdown_handle();

    let stopper = thread::spawn(move || {
        thread::sleep(Duration::from_millis(10));
        handle.stop()
    });

    let report = pipeline.join().unwrap();
    assert!(stopper.join().unwrap());
    assert_eq!(report.reason, ShutdownReason::Requested);
}

#[test]
fn dropping_a_running_pipeline_stops_it() {
    init_test_logging();
    let camera = SimulatedCamera::new(test_device("SN-1", 1));
    let probe = camera.probe();
    let pipeline = Pipeline::start(camera, RecordingSink::new(), fast_config()).unwrap();

    let started = Instant::now();
    drop(pipeline);

    assert!(started.elapsed() < Duration::from_secs(1));
    assert_eq!(probe.stop_calls(), 1);
}

#[test]
fn report_round_trips_through_yaml() {
    let camera = SimulatedCamera::new(test_device("SN-1", 1)).with_frames(1..=2);
    let report = Pipeline::start(camera, RecordingSink::new(), with_target(2))
        .unwrap()
        .join()
        .unwrap();

    let yaml = serde_yaml_ng::to_string(&report).unwrap();
    assert!(yaml.contains("reason: TargetReached"));
    let parsed: PipelineReport = serde_yaml_ng::from_str(&yaml).unwrap();
    assert_eq!(parsed, report);
}

#[tokio::test]
async fn async_wait_resolves_with_report() {
    init_test_logging();
    let camera = SimulatedCamera::new(test_device("SN-1", 1)).with_frames(1..=5);
    let pipeline = Pipeline::start(camera, RecordingSink::new(), with_target(5)).unwrap();

    let report = tokio::time::timeout(DEADLINE, pipeline.wait())
        .await
        .expect("pipeline did not finish")
        .unwrap();
    assert_eq!(report.stats.frames_processed, 5);
}

#[tokio::test]
async fn state_updates_end_on_latest_state() {
    init_test_logging();
    let device = test_device("SN-1", 1);
    let camera = SimulatedCamera::new(device.clone())
        .with_frames([1, 2])
        .then_disconnect()
        .then_reappear(2, device)
        .with_frames([3, 4]);
    let pipeline = Pipeline::start(camera, RecordingSink::new(), with_target(4)).unwrap();
    let updates = pipeline.state_updates();

    let report = tokio::time::timeout(DEADLINE, pipeline.wait()).await.unwrap().unwrap();
    assert_eq!(report.stats.reconnects, 1);

    // The stream ends once the pipeline is gone
    let states: Vec<ConnectionState> = tokio::time::timeout(DEADLINE, updates.collect())
        .await
        .expect("state stream did not end");
    info!(?states, "Observed connection states");
    assert_eq!(states.last(), Some(&ConnectionState::Connected));
}

#[tokio::test]
async fn state_updates_report_fatal() {
    init_test_logging();
    let camera = SimulatedCamera::new(test_device("SN-1", 1))
        .with_frames([1])
        .then_disconnect()
        .then_reappear(0, test_device("SN-1", 9));
    let pipeline = Pipeline::start(camera, RecordingSink::new(), fast_config()).unwrap();
    let updates = pipeline.state_updates();

    let result = tokio::time::timeout(DEADLINE, pipeline.wait()).await.unwrap();
    assert!(matches!(result, Err(PipelineError::SubnetMismatch { .. })));

    let states: Vec<ConnectionState> = tokio::time::timeout(DEADLINE, updates.collect()).await.unwrap();
    assert_eq!(states.last(), Some(&ConnectionState::Fatal));
}
