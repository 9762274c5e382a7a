//! Bounded blocking work queue with completion tracking.
//!
//! [`WorkQueue`] is the single hand-off between the frame reader and the
//! worker pool. [`put`](WorkQueue::put) blocks while the queue is full and
//! [`get`](WorkQueue::get) blocks while it is empty, which bounds the number
//! of frames alive at once to `capacity + workers`.
//!
//! Every item taken with `get` must be acknowledged with
//! [`task_done`](WorkQueue::task_done). [`join`](WorkQueue::join) blocks until
//! every item ever put has been acknowledged.

use std::collections::VecDeque;
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};

use crate::frame::IndexedFrame;

/// An item travelling from the reader to a worker.
#[derive(Debug)]
pub enum WorkItem {
    /// A frame to transform.
    Frame(IndexedFrame),
    /// Termination marker. Each worker stops after taking exactly one.
    Stop,
}

struct QueueState<T> {
    items: VecDeque<T>,
    /// Items put but not yet acknowledged.
    unfinished: usize,
}

/// A fixed-capacity multi-producer multi-consumer blocking queue.
pub struct WorkQueue<T> {
    capacity: usize,
    state: Mutex<QueueState<T>>,
    not_full: Condvar,
    not_empty: Condvar,
    all_done: Condvar,
}

impl<T> WorkQueue<T> {
    /// Create a queue holding at most `capacity` items (minimum 1).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            state: Mutex::new(QueueState {
                items: VecDeque::with_capacity(capacity),
                unfinished: 0,
            }),
            not_full: Condvar::new(),
            not_empty: Condvar::new(),
            all_done: Condvar::new(),
        }
    }

    /// Maximum number of queued items.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of items currently queued.
    pub fn len(&self) -> usize {
        self.lock().items.len()
    }

    /// Returns `true` if nothing is queued.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Append an item, blocking while the queue is full.
    pub fn put(&self, item: T) {
        let mut state = self.lock();
        while state.items.len() >= self.capacity {
            state = self
                .not_full
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }
        state.items.push_back(item);
        state.unfinished += 1;
        drop(state);
        self.not_empty.notify_one();
    }

    /// Remove the oldest item, blocking while the queue is empty.
    pub fn get(&self) -> T {
        let mut state = self.lock();
        loop {
            if let Some(item) = state.items.pop_front() {
                drop(state);
                self.not_full.notify_one();
                return item;
            }
            state = self
                .not_empty
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Acknowledge one item previously taken with [`get`](WorkQueue::get).
    ///
    /// Extra acknowledgements are ignored.
    pub fn task_done(&self) {
        let mut state = self.lock();
        if state.unfinished == 0 {
            log::warn!("task_done called more times than items were queued");
            return;
        }
        state.unfinished -= 1;
        if state.unfinished == 0 {
            self.all_done.notify_all();
        }
    }

    /// Block until every item put so far has been acknowledged.
    pub fn join(&self) {
        let mut state = self.lock();
        while state.unfinished > 0 {
            state = self
                .all_done
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    // The state stays consistent across a panicking holder: every mutation
    // is a single push/pop/counter update.
    fn lock(&self) -> MutexGuard<'_, QueueState<T>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
