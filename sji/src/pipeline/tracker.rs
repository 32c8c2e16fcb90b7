//! In-flight accounting and run counters

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::domain::TaskKind;

/// Count of tasks that left the work queue and are not yet resolved
#[derive(Debug, Clone, Default)]
pub struct InFlight {
    count: Arc<AtomicUsize>,
}

impl InFlight {
    pub fn new() -> Self {
        Self::default()
    }

    /// Increment now, decrement when the returned guard drops
    pub fn acquire(&self) -> InFlightGuard {
        self.count.fetch_add(1, Ordering::SeqCst);
        InFlightGuard {
            count: self.count.clone(),
        }
    }

    pub fn get(&self) -> usize {
        self.count.load(Ordering::SeqCst)
    }
}

/// Held by whoever owns a dispatched task; releases exactly once
#[derive(Debug)]
pub struct InFlightGuard {
    count: Arc<AtomicUsize>,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.count.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Terminal state of one task execution
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Applied,
    Skipped,
    /// References a repository that no longer exists
    Dropped,
    Failed(String),
}

/// Per-run totals
#[derive(Debug, Default)]
pub struct RunStats {
    applied: AtomicUsize,
    skipped: AtomicUsize,
    dropped: AtomicUsize,
    failed: AtomicUsize,
    repaired: AtomicUsize,
}

/// Point-in-time copy of [`RunStats`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub applied: usize,
    pub skipped: usize,
    pub dropped: usize,
    /// Failure events, including ones later replayed successfully
    pub failed: usize,
    pub repaired: usize,
}

impl RunStats {
    pub fn record(&self, kind: TaskKind, outcome: &Outcome) {
        let counter = match outcome {
            Outcome::Applied => &self.applied,
            Outcome::Skipped => &self.skipped,
            Outcome::Dropped => &self.dropped,
            Outcome::Failed(_) => &self.failed,
        };
        counter.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(%kind, ?outcome, "RunStats::record");
    }

    pub fn record_repair(&self) {
        self.repaired.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            applied: self.applied.load(Ordering::Relaxed),
            skipped: self.skipped.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            repaired: self.repaired.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_guard_releases_on_drop() {
        let in_flight = InFlight::new();
        let a = in_flight.acquire();
        let b = in_flight.acquire();
        assert_eq!(in_flight.get(), 2);
        drop(a);
        assert_eq!(in_flight.get(), 1);
        drop(b);
        assert_eq!(in_flight.get(), 0);
    }

    #[test]
    fn test_guard_releases_on_panic_unwind() {
        let in_flight = InFlight::new();
        let tracker = in_flight.clone();
        let result = std::panic::catch_unwind(move || {
            let _guard = tracker.acquire();
            panic!("worker blew up");
        });
        assert!(result.is_err());
        assert_eq!(in_flight.get(), 0);
    }

    #[test]
    fn test_stats_record() {
        let stats = RunStats::default();
        stats.record(TaskKind::Group, &Outcome::Applied);
        stats.record(TaskKind::User, &Outcome::Skipped);
        stats.record(TaskKind::PermissionV2, &Outcome::Dropped);
        stats.record(TaskKind::PermissionV2, &Outcome::Failed("x".into()));
        stats.record_repair();
        assert_eq!(
            stats.snapshot(),
            StatsSnapshot {
                applied: 1,
                skipped: 1,
                dropped: 1,
                failed: 1,
                repaired: 1,
            }
        );
    }

    proptest! {
        #[test]
        fn prop_count_matches_live_guards(ops in proptest::collection::vec(any::<bool>(), 0..64)) {
            let in_flight = InFlight::new();
            let mut guards = Vec::new();
            for acquire in ops {
                if acquire {
                    guards.push(in_flight.acquire());
                } else {
                    guards.pop();
                }
                prop_assert_eq!(in_flight.get(), guards.len());
            }
            guards.clear();
            prop_assert_eq!(in_flight.get(), 0);
        }
    }
}
