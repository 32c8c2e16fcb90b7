//! Import pipeline
//!
//! ```text
//! producer -> WorkQueue -> dispatch -> mpsc(W+1) -> W workers -> remote
//!                ^                                    |   |
//!                |                     FailureCollector   End
//!                +-------------- replay ----------- barrier
//! ```
//!
//! A task is counted in flight from the moment the dispatch loop takes it off
//! the queue until the owning worker resolves it. The barrier treats an empty
//! queue with nothing in flight as drained.

mod barrier;
mod failures;
mod operator;
mod producer;
mod queue;
mod repair;
mod runner;
mod tracker;
mod worker;

pub use failures::{Failure, FailureCollector};
pub use operator::{FixedAnswer, Operator, TerminalOperator, parse_answer};
pub use producer::tasks;
pub use queue::WorkQueue;
pub use repair::{CACHE_SUFFIX, repair_repositories};
pub use runner::{Pipeline, PipelineConfig, PipelineError, RunOutcome};
pub use tracker::{InFlight, InFlightGuard, Outcome, RunStats, StatsSnapshot};
pub use worker::{Job, RESERVED_USERS, SkipIndex, TaskHandler};
