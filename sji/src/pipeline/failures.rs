//! Failure collector

use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::warn;

use crate::domain::Task;

/// A task whose submission ultimately failed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Failure {
    pub task: Task,
    pub cause: String,
}

#[derive(Debug, Default)]
pub struct FailureCollector {
    inner: Mutex<Vec<Failure>>,
}

impl FailureCollector {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Failure>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn record(&self, task: Task, cause: impl Into<String>) {
        let cause = cause.into();
        warn!(%task, %cause, "Task failed");
        self.lock().push(Failure { task, cause });
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn snapshot(&self) -> Vec<Failure> {
        self.lock().clone()
    }

    /// Take every failure, leaving the collector empty
    pub fn drain(&self) -> Vec<Failure> {
        std::mem::take(&mut *self.lock())
    }
}
