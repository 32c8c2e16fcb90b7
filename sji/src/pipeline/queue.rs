//! Work queue shared by the producer, the dispatch loop and the barrier

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::debug;

use crate::domain::Task;

use super::tracker::{InFlight, InFlightGuard};

/// FIFO of tasks not yet taken by a worker
#[derive(Debug, Default)]
pub struct WorkQueue {
    inner: Mutex<VecDeque<Task>>,
}

impl WorkQueue {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<Task>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn push(&self, task: Task) {
        self.lock().push_back(task);
    }

    /// Append in order under a single lock
    pub fn push_all(&self, tasks: impl IntoIterator<Item = Task>) {
        let mut queue = self.lock();
        queue.extend(tasks);
        debug!(len = queue.len(), "WorkQueue::push_all: queued");
    }

    pub fn pop(&self) -> Option<Task> {
        self.lock().pop_front()
    }

    /// Pop the front task, counting it in flight before the lock is released
    ///
    /// End is never counted.
    pub fn take(&self, in_flight: &InFlight) -> Option<(Task, Option<InFlightGuard>)> {
        let mut queue = self.lock();
        let task = queue.pop_front()?;
        let guard = (!task.is_end()).then(|| in_flight.acquire());
        Some((task, guard))
    }

    /// Nothing queued and nothing in flight, observed under the queue lock
    pub fn is_drained(&self, in_flight: &InFlight) -> bool {
        let queue = self.lock();
        queue.is_empty() && in_flight.get() == 0
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Drop every queued task; returns how many were discarded
    pub fn clear(&self) -> usize {
        let mut queue = self.lock();
        let discarded = queue.len();
        queue.clear();
        debug!(discarded, "WorkQueue::clear: called");
        discarded
    }
}
