//! Frame sink trait for processing and persistence

use crate::types::Frame;

/// Consumer-side collaborator that processes frames.
///
/// `process` takes the frame by value; the frame is released when the sink
/// returns. Every consumer thread shares the same sink, so implementations
/// must be re-entrant (or serialize internally) when more than one consumer
/// is configured.
///
/// Errors are per-frame: the pipeline logs them and moves on.
pub trait Sink: Send + Sync + 'static {
    fn process(&self, frame: Frame) -> anyhow::Result<()>;
}

impl<F> Sink for F
where
    F: Fn(Frame) -> anyhow::Result<()> + Send + Sync + 'static,
{
    fn process(&self, frame: Frame) -> anyhow::Result<()> {
        self(frame)
    }
}

impl<K: Sink> Sink for std::sync::Arc<K> {
    fn process(&self, frame: Frame) -> anyhow::Result<()> {
        (**self).process(frame)
    }
}

/// Sink that drops every frame. Useful for measuring acquisition alone.
#[derive(Debug, Default, Clone, Copy)]
pub struct DiscardSink;

impl Sink for DiscardSink {
    fn process(&self, _frame: Frame) -> anyhow::Result<()> {
        Ok(())
    }
}
