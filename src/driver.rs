//! Driver starts the stream and spawns the pipeline threads

use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use tracing::{debug, error, info};

use crate::config::PipelineConfig;
use crate::coordinator::{Baseline, Coordinator};
use crate::queue::FrameQueue;
use crate::sink::Sink;
use crate::source::FrameSource;
use crate::types::ShutdownReason;
use crate::workers::{AcquisitionWorker, ConnectivityMonitor, ProcessingWorker, SharedSource, lock_source};
use crate::{PipelineError, Result};

/// A named worker thread.
pub(crate) struct WorkerThread {
    pub name: String,
    pub handle: JoinHandle<()>,
}

/// Result of spawning the pipeline
pub(crate) struct DriverParts {
    pub coordinator: Arc<Coordinator>,
    pub threads: Vec<WorkerThread>,
    /// Stops the stream once every thread has been joined
    pub stop_stream: Box<dyn FnOnce() + Send>,
}

/// Driver spawns and wires the pipeline threads
///
/// Threads are started monitor first, then consumers, then the producer, so
/// every waiter exists before the first frame or disconnect can occur.
pub(crate) struct Driver;

impl Driver {
    pub fn spawn<S, K>(mut source: S, sink: K, config: &PipelineConfig) -> Result<DriverParts>
    where
        S: FrameSource,
        K: Sink,
    {
        config.validate()?;

        source.start_stream()?;
        let baseline = match Self::capture_baseline(&source) {
            Ok(baseline) => baseline,
            Err(e) => {
                source.stop_stream();
                return Err(e);
            }
        };
        info!(
            device = %baseline.device,
            subnet = %baseline.fingerprint,
            consumers = config.consumers,
            queue_capacity = ?config.queue_capacity,
            "Stream started"
        );

        let queue = Arc::new(FrameQueue::with_capacity(config.queue_capacity));
        let coordinator = Arc::new(Coordinator::new(queue, baseline));
        let source: SharedSource<S> = Arc::new(Mutex::new(source));
        let sink = Arc::new(sink);

        let stop_stream: Box<dyn FnOnce() + Send> = {
            let source = Arc::clone(&source);
            Box::new(move || {
                lock_source(&source).stop_stream();
                debug!("Stream stopped");
            })
        };

        let mut threads = Vec::with_capacity(config.consumers + 2);
        if let Err(e) = Self::spawn_all(&mut threads, source, sink, &coordinator, config) {
            error!(error = %e, "Failed to spawn pipeline threads");
            coordinator.shutdown(ShutdownReason::Requested);
            for worker in threads {
                let _ = worker.handle.join();
            }
            stop_stream();
            return Err(e);
        }

        Ok(DriverParts { coordinator, threads, stop_stream })
    }

    fn spawn_all<S, K>(
        threads: &mut Vec<WorkerThread>,
        source: SharedSource<S>,
        sink: Arc<K>,
        coordinator: &Arc<Coordinator>,
        config: &PipelineConfig,
    ) -> Result<()>
    where
        S: FrameSource,
        K: Sink,
    {
        let monitor = ConnectivityMonitor::new(Arc::clone(&source), Arc::clone(coordinator), config);
        threads.push(Self::spawn_thread("framelink-monitor".to_string(), move || monitor.run())?);

        for index in 0..config.consumers {
            let worker = ProcessingWorker::new(index, Arc::clone(&sink), Arc::clone(coordinator));
            threads.push(Self::spawn_thread(format!("framelink-consumer-{index}"), move || worker.run())?);
        }

        let producer = AcquisitionWorker::new(source, Arc::clone(coordinator), config);
        threads.push(Self::spawn_thread("framelink-acquisition".to_string(), move || producer.run())?);

        Ok(())
    }

    fn spawn_thread<F>(name: String, body: F) -> Result<WorkerThread>
    where
        F: FnOnce() + Send + 'static,
    {
        let handle = thread::Builder::new()
            .name(name.clone())
            .spawn(body)
            .map_err(|source| PipelineError::ThreadSpawn { name: name.clone(), source })?;
        debug!(thread = %name, "Spawned worker");
        Ok(WorkerThread { name, handle })
    }

    fn capture_baseline<S: FrameSource>(source: &S) -> Result<Baseline> {
        let device = source.device()?;
        let fingerprint = source.subnet_fingerprint()?;
        Ok(Baseline { fingerprint, device })
    }
}
