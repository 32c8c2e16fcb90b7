//! Per-task execution and the worker loop

use std::sync::Arc;

use reqwest::Url;
use tokio::sync::{Mutex, mpsc};
use tracing::{debug, info, warn};

use crate::domain::{Entry, ExistingUser, PermissionV2Record, Task, TaskKind, UserRecord};
use crate::remote::{CredentialPool, Credentials, Endpoints, HttpRequest, HttpResponse, RemoteError, RequestExecutor};

use super::barrier::{self, BarrierStep};
use super::repair::repair_repositories;
use super::runner::{PipelineError, RunOutcome, Shared};
use super::tracker::{InFlightGuard, Outcome, RunStats};

/// Accounts the import must never touch
pub const RESERVED_USERS: [&str; 5] = ["access-admin", "admin", "xray", "_internal", "anonymous"];

const MISSING_REPOSITORIES: &str = "Permission target request missing repositories";
const NON_EXISTING_REPOSITORY: &str = "Permission target contains a reference to a non-existing repository";

/// A task handed from the dispatch loop to a worker
#[derive(Debug)]
pub struct Job {
    pub task: Task,
    /// `None` for End
    pub guard: Option<InFlightGuard>,
}

/// Ordinals below these thresholds are skipped, per kind
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SkipIndex {
    pub group: usize,
    pub user: usize,
    pub permission: usize,
}

impl SkipIndex {
    pub fn skips(&self, kind: TaskKind, ordinal: usize) -> bool {
        let threshold = match kind {
            TaskKind::Group => self.group,
            TaskKind::User => self.user,
            TaskKind::Permission | TaskKind::PermissionV2 => self.permission,
            TaskKind::End => 0,
        };
        ordinal < threshold
    }
}

/// Applies one task against the remote admin API
pub struct TaskHandler {
    executor: Arc<RequestExecutor>,
    endpoints: Endpoints,
    credentials: CredentialPool,
    skip: SkipIndex,
    stats: Arc<RunStats>,
}

impl TaskHandler {
    pub fn new(
        executor: Arc<RequestExecutor>,
        endpoints: Endpoints,
        credentials: CredentialPool,
        skip: SkipIndex,
        stats: Arc<RunStats>,
    ) -> Self {
        debug!(?skip, credentials = credentials.count(), "TaskHandler::new: called");
        Self {
            executor,
            endpoints,
            credentials,
            skip,
            stats,
        }
    }

    /// GET ping; anything but 200 is reported as an error string
    pub async fn check_liveness(&self) -> Result<(), String> {
        debug!("TaskHandler::check_liveness: called");
        let response = self
            .executor
            .execute(&HttpRequest::get(self.endpoints.ping()), self.credentials.pick())
            .await
            .map_err(|e| e.to_string())?;
        if response.status == 200 {
            Ok(())
        } else {
            Err(format!("ping returned HTTP {}", response.status))
        }
    }

    /// Apply one task; End belongs to the barrier and must not reach here
    pub async fn handle(&self, task: &Task) -> Outcome {
        debug!(%task, "TaskHandler::handle: called");
        if let Some(ordinal) = task.ordinal()
            && self.skip.skips(task.kind(), ordinal)
        {
            info!(%task, "Skipping, below skip index");
            return Outcome::Skipped;
        }

        let credentials = self.credentials.pick();
        match task {
            Task::Group(entry) => {
                let url = self.endpoints.group(&entry.name);
                self.put_task(task, url, 201, credentials).await
            }
            Task::Permission(entry) => {
                let url = self.endpoints.permission(&entry.name);
                self.apply_permission(task, url, credentials).await
            }
            Task::PermissionV2(entry) => {
                let url = self.endpoints.permission_v2(&entry.name);
                self.apply_permission(task, url, credentials).await
            }
            Task::User(entry) => self.apply_user(entry, credentials).await,
            Task::End => unreachable!("End is consumed by the worker loop and never handled as a task"),
        }
    }

    async fn put(&self, url: Url, body: Vec<u8>, credentials: &Credentials) -> Result<HttpResponse, RemoteError> {
        self.executor.execute(&HttpRequest::put_json(url, body), credentials).await
    }

    async fn put_task(&self, task: &Task, url: Url, success: u16, credentials: &Credentials) -> Outcome {
        let body = match task.payload_json() {
            Ok(body) => body,
            Err(e) => return Outcome::Failed(format!("serialization failed: {}", e)),
        };
        match self.put(url, body, credentials).await {
            Ok(response) if response.status == success => {
                debug!(%task, status = response.status, "Applied");
                Outcome::Applied
            }
            Ok(response) => Outcome::Failed(unexpected(&response)),
            Err(e) => Outcome::Failed(e.to_string()),
        }
    }

    async fn apply_permission(&self, task: &Task, url: Url, credentials: &Credentials) -> Outcome {
        let body = match task.payload_json() {
            Ok(body) => body,
            Err(e) => return Outcome::Failed(format!("serialization failed: {}", e)),
        };
        let response = match self.put(url.clone(), body, credentials).await {
            Ok(response) => response,
            Err(e) => return Outcome::Failed(e.to_string()),
        };
        if response.status == 200 {
            debug!(%task, "Applied");
            return Outcome::Applied;
        }

        let text = response.text();
        if text.contains(NON_EXISTING_REPOSITORY) {
            warn!(%task, "Dropping, target references a repository that no longer exists");
            return Outcome::Dropped;
        }
        if let Task::PermissionV2(entry) = task
            && text.contains(MISSING_REPOSITORIES)
        {
            return self.repair_and_resubmit(entry, url, credentials).await;
        }
        Outcome::Failed(unexpected(&response))
    }

    async fn repair_and_resubmit(
        &self,
        entry: &Entry<PermissionV2Record>,
        url: Url,
        credentials: &Credentials,
    ) -> Outcome {
        info!(name = %entry.name, ordinal = entry.ordinal, "Repairing repository references");
        let keys = entry.payload.repositories();
        let repaired = match repair_repositories(&self.executor, &self.endpoints, keys, credentials).await {
            Ok(repaired) => repaired,
            Err(e) => return Outcome::Failed(format!("repository repair failed: {}", e)),
        };
        debug!(before = ?keys, after = ?repaired, "repair_and_resubmit: repaired");

        let record = entry.payload.with_repositories(repaired);
        let body = match serde_json::to_vec(&record) {
            Ok(body) => body,
            Err(e) => return Outcome::Failed(format!("serialization failed: {}", e)),
        };
        self.stats.record_repair();
        match self.put(url, body, credentials).await {
            Ok(response) if response.status == 200 => {
                info!(name = %entry.name, "Succeeded on second attempt after repair");
                Outcome::Applied
            }
            Ok(response) => Outcome::Failed(format!("after repair: {}", unexpected(&response))),
            Err(e) => Outcome::Failed(format!("after repair: {}", e)),
        }
    }

    async fn apply_user(&self, entry: &Entry<UserRecord>, credentials: &Credentials) -> Outcome {
        if RESERVED_USERS.contains(&entry.name.as_str()) {
            info!(name = %entry.name, ordinal = entry.ordinal, "Skipping reserved user");
            return Outcome::Skipped;
        }

        let url = self.endpoints.user(&entry.name);
        let lookup = match self.executor.execute(&HttpRequest::get(url.clone()), credentials).await {
            Ok(response) => response,
            Err(e) => return Outcome::Failed(e.to_string()),
        };

        let record = match lookup.status {
            404 => entry.payload.clone(),
            200 => match serde_json::from_slice::<ExistingUser>(&lookup.body) {
                Ok(existing) => {
                    debug!(name = %entry.name, existing = ?existing.groups, "apply_user: merging groups");
                    let mut merged = entry.payload.clone();
                    merged.merge_groups(existing.groups);
                    merged
                }
                Err(e) => return Outcome::Failed(format!("could not decode existing user: {}", e)),
            },
            _ => return Outcome::Failed(format!("user lookup: {}", unexpected(&lookup))),
        };

        let body = match serde_json::to_vec(&record) {
            Ok(body) => body,
            Err(e) => return Outcome::Failed(format!("serialization failed: {}", e)),
        };
        match self.put(url, body, credentials).await {
            Ok(response) if response.status == 201 => Outcome::Applied,
            Ok(response) => Outcome::Failed(unexpected(&response)),
            Err(e) => Outcome::Failed(e.to_string()),
        }
    }
}

fn unexpected(response: &HttpResponse) -> String {
    format!("unexpected HTTP {}: {}", response.status, response.text().trim())
}

/// Pull jobs until the channel closes or this worker finishes the run
pub(crate) async fn run(
    id: usize,
    shared: Arc<Shared>,
    jobs: Arc<Mutex<mpsc::Receiver<Job>>>,
    done: mpsc::Sender<Result<RunOutcome, PipelineError>>,
) {
    debug!(id, "worker::run: started");
    loop {
        let job = {
            let mut rx = jobs.lock().await;
            rx.recv().await
        };
        let Some(Job { task, guard }) = job else {
            debug!(id, "worker::run: channel closed");
            break;
        };

        if task.is_end() {
            drop(guard);
            match barrier::run(&shared).await {
                Ok(BarrierStep::Replay) => continue,
                Ok(BarrierStep::Finished(outcome)) => {
                    let _ = done.send(Ok(outcome)).await;
                    break;
                }
                Err(e) => {
                    let _ = done.send(Err(e)).await;
                    break;
                }
            }
        }

        let outcome = shared.handler.handle(&task).await;
        shared.stats.record(task.kind(), &outcome);
        if let Outcome::Failed(cause) = outcome {
            shared.failures.record(task, cause);
        }
        drop(guard);
        debug!(id, "worker::run: finished job");
    }
}
