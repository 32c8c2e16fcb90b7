//! Pipeline runner: wires producer, dispatch loop, workers and barrier

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize};
use std::time::Duration;

use thiserror::Error;
use tokio::sync::{Mutex, mpsc};
use tokio::time::Instant;
use tracing::{debug, info};

use crate::remote::{CredentialPool, Endpoints, RequestExecutor};
use crate::source::ImportPlan;

use super::failures::{Failure, FailureCollector};
use super::operator::Operator;
use super::producer;
use super::queue::WorkQueue;
use super::tracker::{InFlight, RunStats, StatsSnapshot};
use super::worker::{self, Job, SkipIndex, TaskHandler};

/// Consecutive empty polls before the dispatch loop hints that nothing arrives
const EMPTY_POLL_HINT: usize = 10;

/// Fatal run errors
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Liveness check failed at end of import: {0}")]
    Liveness(String),

    #[error("Operator prompt failed: {0}")]
    Operator(String),

    #[error("All workers stopped before the import finished")]
    Interrupted,
}

/// Pipeline settings
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub workers: usize,
    pub poll_interval: Duration,
    pub skip: SkipIndex,
    pub drain_prompt_after: Duration,
    pub max_replay_rounds: u32,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            workers: 50,
            poll_interval: Duration::from_secs(5),
            skip: SkipIndex::default(),
            drain_prompt_after: Duration::from_secs(60),
            max_replay_rounds: 5,
        }
    }
}

/// How a run ended
#[derive(Debug, Clone)]
pub struct RunOutcome {
    /// Initial round plus accepted replays
    pub rounds: u32,
    pub stats: StatsSnapshot,
    /// Failures left when the run finished
    pub residual: Vec<Failure>,
    pub elapsed: Duration,
    /// Operator stopped waiting for the drain
    pub manual_break: bool,
    /// In-flight tasks left unresolved by manual breaks
    pub abandoned: usize,
}

/// State shared by the dispatch loop, the workers and the barrier
pub(crate) struct Shared {
    pub(crate) config: PipelineConfig,
    pub(crate) handler: TaskHandler,
    pub(crate) queue: Arc<WorkQueue>,
    pub(crate) in_flight: InFlight,
    pub(crate) failures: FailureCollector,
    pub(crate) stats: Arc<RunStats>,
    pub(crate) operator: Arc<dyn Operator>,
    pub(crate) started: Instant,
    pub(crate) round: AtomicU32,
    pub(crate) manual_break: AtomicBool,
    pub(crate) abandoned: AtomicUsize,
}

/// One import run against one remote
pub struct Pipeline {
    config: PipelineConfig,
    executor: Arc<RequestExecutor>,
    endpoints: Endpoints,
    credentials: CredentialPool,
    operator: Arc<dyn Operator>,
}

impl Pipeline {
    pub fn new(
        config: PipelineConfig,
        executor: Arc<RequestExecutor>,
        endpoints: Endpoints,
        credentials: CredentialPool,
        operator: Arc<dyn Operator>,
    ) -> Self {
        debug!(?config, "Pipeline::new: called");
        Self {
            config,
            executor,
            endpoints,
            credentials,
            operator,
        }
    }

    /// Import every task in `plan`; returns once the barrier finishes the run
    pub async fn run(self, plan: ImportPlan) -> Result<RunOutcome, PipelineError> {
        let workers = self.config.workers.max(1);
        info!(workers, tasks = plan.task_count(), "Starting import");

        let stats = Arc::new(RunStats::default());
        let queue = Arc::new(WorkQueue::new());
        let shared = Arc::new(Shared {
            handler: TaskHandler::new(
                self.executor,
                self.endpoints,
                self.credentials,
                self.config.skip,
                stats.clone(),
            ),
            config: self.config,
            queue: queue.clone(),
            in_flight: InFlight::new(),
            failures: FailureCollector::new(),
            stats,
            operator: self.operator,
            started: Instant::now(),
            round: AtomicU32::new(1),
            manual_break: AtomicBool::new(false),
            abandoned: AtomicUsize::new(0),
        });

        let producer = producer::spawn(plan, queue);

        let (job_tx, job_rx) = mpsc::channel::<Job>(workers + 1);
        let job_rx = Arc::new(Mutex::new(job_rx));
        let (done_tx, mut done_rx) = mpsc::channel(1);

        let dispatcher = tokio::spawn(dispatch(shared.clone(), job_tx));
        let handles: Vec<_> = (0..workers)
            .map(|id| tokio::spawn(worker::run(id, shared.clone(), job_rx.clone(), done_tx.clone())))
            .collect();
        drop(done_tx);

        let result = done_rx.recv().await.unwrap_or(Err(PipelineError::Interrupted));

        debug!("Pipeline::run: stopping dispatch loop and workers");
        dispatcher.abort();
        producer.abort();
        for handle in handles {
            handle.abort();
        }
        result
    }
}

/// Move tasks from the work queue into the worker channel
async fn dispatch(shared: Arc<Shared>, jobs: mpsc::Sender<Job>) {
    debug!("dispatch: started");
    let mut empty_polls = 0usize;
    loop {
        match shared.queue.take(&shared.in_flight) {
            Some((task, guard)) => {
                empty_polls = 0;
                if jobs.send(Job { task, guard }).await.is_err() {
                    debug!("dispatch: workers gone");
                    break;
                }
            }
            None => {
                debug!(interval = ?shared.config.poll_interval, "Work queue is empty, sleeping");
                tokio::time::sleep(shared.config.poll_interval).await;
                empty_polls += 1;
                if empty_polls > EMPTY_POLL_HINT {
                    debug!(empty_polls, "Nothing is getting put into the work queue");
                }
            }
        }
    }
}
