//! FIFO hand-off queue between producer and consumers

use std::collections::VecDeque;
use std::fmt;
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};

use crate::types::Frame;

/// Returned by [`FrameQueue::push`] once the queue is closed. Hands the item
/// back so the caller can release it properly.
pub struct QueueClosed<T>(pub T);

impl<T> QueueClosed<T> {
    pub fn into_inner(self) -> T {
        self.0
    }
}

impl<T> fmt::Debug for QueueClosed<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("QueueClosed(..)")
    }
}

impl<T> fmt::Display for QueueClosed<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("frame queue is closed")
    }
}

impl<T> std::error::Error for QueueClosed<T> {}

struct QueueState<T> {
    items: VecDeque<T>,
    closed: bool,
}

/// Thread-safe FIFO queue of in-flight frames.
///
/// Every push wakes exactly one waiting consumer. `close` wakes everyone:
/// consumers keep draining whatever is still queued and then observe
/// empty-and-closed as `None` from [`FrameQueue::pop`]. Closing is terminal.
///
/// By default the queue is unbounded and `push` never blocks. A bounded queue
/// makes `push` wait for space instead, which applies backpressure to the
/// producer at the cost of holding device buffers longer when consumers
/// stall.
pub struct FrameQueue<T = Frame> {
    state: Mutex<QueueState<T>>,
    available: Condvar,
    space: Condvar,
    capacity: Option<usize>,
}

impl<T> FrameQueue<T> {
    /// Create an unbounded queue.
    pub fn new() -> Self {
        Self::with_capacity(None)
    }

    /// Create a queue holding at most `capacity` items.
    pub fn bounded(capacity: usize) -> Self {
        Self::with_capacity(Some(capacity.max(1)))
    }

    pub fn with_capacity(capacity: Option<usize>) -> Self {
        Self {
            state: Mutex::new(QueueState { items: VecDeque::new(), closed: false }),
            available: Condvar::new(),
            space: Condvar::new(),
            capacity,
        }
    }

    /// Append `item` to the tail.
    ///
    /// Blocks only on a bounded queue that is full, until space frees up or
    /// the queue is closed.
    pub fn push(&self, item: T) -> Result<(), QueueClosed<T>> {
        let mut state = self.lock();

        if let Some(capacity) = self.capacity {
            state = self
                .space
                .wait_while(state, |s| !s.closed && s.items.len() >= capacity)
                .unwrap_or_else(PoisonError::into_inner);
        }

        if state.closed {
            return Err(QueueClosed(item));
        }

        state.items.push_back(item);
        drop(state);

        self.available.notify_one();
        Ok(())
    }

    /// Remove the head, blocking while the queue is empty and open.
    ///
    /// Returns `None` only once the queue is closed and fully drained.
    pub fn pop(&self) -> Option<T> {
        let state = self.lock();
        let mut state = self
            .available
            .wait_while(state, |s| !s.closed && s.items.is_empty())
            .unwrap_or_else(PoisonError::into_inner);

        let item = state.items.pop_front();
        drop(state);

        if item.is_some() && self.capacity.is_some() {
            self.space.notify_one();
        }
        item
    }

    /// Remove the head without blocking.
    pub fn try_pop(&self) -> Option<T> {
        let item = self.lock().items.pop_front();
        if item.is_some() && self.capacity.is_some() {
            self.space.notify_one();
        }
        item
    }

    /// Close the queue and wake every waiter.
    ///
    /// Returns `false` if it was already closed.
    pub fn close(&self) -> bool {
        let mut state = self.lock();
        let newly_closed = !state.closed;
        state.closed = true;
        drop(state);

        self.available.notify_all();
        self.space.notify_all();
        newly_closed
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    /// Current length. Observational only; may be stale on return.
    pub fn len(&self) -> usize {
        self.lock().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> Option<usize> {
        self.capacity
    }

    fn lock(&self) -> MutexGuard<'_, QueueState<T>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<T> Default for FrameQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for FrameQueue<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.lock();
        f.debug_struct("FrameQueue")
            .field("len", &state.items.len())
            .field("closed", &state.closed)
            .field("capacity", &self.capacity)
            .finish()
    }
}
