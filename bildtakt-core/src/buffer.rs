//! Bounded, order-preserving frame buffer shared between the producer and the
//! consumer thread.
//!
//! One lock guards the queue; three condition variables coordinate the
//! full/empty/idle transitions. Frames leave strictly in submission order.
//!
//! - `enqueue` blocks while the buffer is full (back-pressure on the producer)
//! - `drain_next` blocks while the buffer is empty
//! - `close` releases every blocked caller; blocked calls then report
//!   [`BufferError::Closed`] or `None`

use std::collections::VecDeque;
use std::time::Instant;

use parking_lot::{Condvar, Mutex};
use tracing::trace;

use crate::error::BufferError;
use crate::frame::Timestamped;

/// Result of a successful [`FrameBuffer::enqueue`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Enqueued {
    /// Whether the caller had to wait for space.
    pub waited: bool,
    /// Occupancy right after the push.
    pub occupancy: usize,
}

struct BufferState<T> {
    queue: VecDeque<T>,
    capacity: usize,
    /// Set between `drain_next` handing out an item and `complete`.
    in_flight: bool,
    closed: bool,
}

impl<T> BufferState<T> {
    #[inline]
    fn is_full(&self) -> bool {
        // A zero capacity still admits a single hand-off once the queue is empty.
        self.queue.len() >= self.capacity.max(1)
    }

    #[inline]
    fn is_idle(&self) -> bool {
        self.queue.is_empty() && !self.in_flight
    }
}

/// Bounded FIFO with blocking enqueue and dequeue.
pub struct FrameBuffer<T> {
    state: Mutex<BufferState<T>>,
    not_full: Condvar,
    not_empty: Condvar,
    idle: Condvar,
    wake: Condvar,
}

impl<T> FrameBuffer<T> {
    /// Creates a buffer and reserves storage for `capacity` items up front.
    ///
    /// # Errors
    /// [`BufferError::Allocation`] when the storage cannot be reserved.
    pub fn with_capacity(capacity: usize) -> Result<Self, BufferError> {
        let mut queue = VecDeque::new();
        queue.try_reserve(capacity)?;

        Ok(Self {
            state: Mutex::new(BufferState {
                queue,
                capacity,
                in_flight: false,
                closed: false,
            }),
            not_full: Condvar::new(),
            not_empty: Condvar::new(),
            idle: Condvar::new(),
            wake: Condvar::new(),
        })
    }

    /// Appends `item`, waiting while the buffer is full.
    ///
    /// # Errors
    /// [`BufferError::Closed`] if the buffer is closed before space frees up;
    /// the item is dropped.
    pub fn enqueue(&self, item: T) -> Result<Enqueued, BufferError> {
        let mut state = self.state.lock();
        let mut waited = false;

        while !state.closed && state.is_full() {
            waited = true;
            self.not_full.wait(&mut state);
        }
        if state.closed {
            return Err(BufferError::Closed);
        }

        if state.queue.len() == state.queue.capacity() {
            state.queue.try_reserve(1)?;
        }
        state.queue.push_back(item);
        let occupancy = state.queue.len();
        self.not_empty.notify_one();

        Ok(Enqueued { waited, occupancy })
    }

    /// Removes the oldest item, waiting while the buffer is empty.
    ///
    /// Returns `None` once the buffer is closed. The caller must call
    /// [`complete`](Self::complete) after it finished with the item.
    pub fn drain_next(&self) -> Option<T> {
        let mut state = self.state.lock();
        loop {
            if state.closed {
                return None;
            }
            if let Some(item) = state.queue.pop_front() {
                state.in_flight = true;
                self.not_full.notify_one();
                return Some(item);
            }
            self.not_empty.wait(&mut state);
        }
    }

    /// Marks the item last returned by `drain_next` as fully handled.
    pub fn complete(&self) {
        let mut state = self.state.lock();
        state.in_flight = false;
        if state.is_idle() {
            self.idle.notify_all();
        }
    }

    /// Waits until every queued item has been drained and completed.
    ///
    /// # Errors
    /// [`BufferError::Closed`] if the buffer closes first.
    pub fn wait_idle(&self) -> Result<(), BufferError> {
        let mut state = self.state.lock();
        while !state.closed && !state.is_idle() {
            self.idle.wait(&mut state);
        }
        if state.closed {
            Err(BufferError::Closed)
        } else {
            Ok(())
        }
    }

    /// Sleeps until `deadline` unless the buffer closes first.
    ///
    /// Returns `true` when the deadline was reached, `false` on close.
    pub fn sleep_until(&self, deadline: Instant) -> bool {
        let mut state = self.state.lock();
        while !state.closed {
            if self.wake.wait_until(&mut state, deadline).timed_out() {
                return !state.closed;
            }
        }
        false
    }

    /// New capacity for subsequent enqueues. Queued items are never evicted,
    /// so occupancy may stay above a shrunk capacity until drained.
    pub fn set_capacity(&self, capacity: usize) {
        let mut state = self.state.lock();
        state.capacity = capacity;
        self.not_full.notify_all();
    }

    pub fn capacity(&self) -> usize {
        self.state.lock().capacity
    }

    pub fn len(&self) -> usize {
        self.state.lock().queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.lock().queue.is_empty()
    }

    /// Releases every blocked caller. Further enqueues fail and `drain_next`
    /// returns `None`.
    pub fn close(&self) {
        let mut state = self.state.lock();
        state.closed = true;
        self.not_full.notify_all();
        self.not_empty.notify_all();
        self.idle.notify_all();
        self.wake.notify_all();
    }

    /// Accepts items again after [`close`](Self::close). Only call once no
    /// thread is draining; an item left in flight by that thread is forgotten.
    pub fn reopen(&self) {
        let mut state = self.state.lock();
        state.closed = false;
        state.in_flight = false;
    }
}

impl<T: Timestamped> FrameBuffer<T> {
    /// Discards every queued item whose simulated time is at or before
    /// `cutoff` and returns how many were removed.
    pub fn resync_discard(&self, cutoff: f64) -> usize {
        let mut state = self.state.lock();
        let before = state.queue.len();
        state.queue.retain(|item| item.sim_time() > cutoff);
        let removed = before - state.queue.len();

        if removed > 0 {
            trace!(removed, cutoff, "discarded stale frames");
            self.not_full.notify_all();
            if state.is_idle() {
                self.idle.notify_all();
            }
        }
        removed
    }
}
