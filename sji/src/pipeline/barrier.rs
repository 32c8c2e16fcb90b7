//! Completion barrier and failure replay
//!
//! Run by whichever worker receives End. Confirms the remote is still up,
//! waits for every dispatched task to resolve, reports failures and lets the
//! operator re-queue them as a new round.

use std::sync::Arc;
use std::sync::atomic::Ordering;

use colored::Colorize;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::domain::Task;

use super::failures::Failure;
use super::operator::Operator;
use super::runner::{PipelineError, RunOutcome, Shared};

pub(crate) const BREAK_QUESTION: &str = "Do you want to break manually?";
pub(crate) const RETRY_QUESTION: &str = "Do you want to retry these?";

/// What the worker holding End does next
#[derive(Debug)]
pub(crate) enum BarrierStep {
    /// Failures were re-queued behind a new End
    Replay,
    Finished(RunOutcome),
}

async fn ask(operator: &Arc<dyn Operator>, question: &'static str) -> Result<bool, PipelineError> {
    let operator = operator.clone();
    tokio::task::spawn_blocking(move || operator.confirm(question))
        .await
        .map_err(|e| PipelineError::Operator(e.to_string()))?
        .map_err(|e| PipelineError::Operator(e.to_string()))
}

/// Block until nothing is queued or in flight, offering a manual break
/// once per `drain_prompt_after`
///
/// A break stops the wait at once: queued tasks are discarded and tasks
/// still owned by workers are abandoned to finish on their own or be aborted
/// with the run. No further break is offered in this round.
async fn drain(shared: &Shared) -> Result<(), PipelineError> {
    let started = Instant::now();
    let mut next_prompt = started + shared.config.drain_prompt_after;
    let offers_break = shared.operator.offers_break();

    while !shared.queue.is_drained(&shared.in_flight) {
        info!(
            queued = shared.queue.len(),
            in_flight = shared.in_flight.get(),
            "End detected, waiting for the last requests to go through"
        );
        tokio::time::sleep(shared.config.poll_interval).await;

        if offers_break && Instant::now() >= next_prompt && !shared.queue.is_drained(&shared.in_flight) {
            if ask(&shared.operator, BREAK_QUESTION).await? {
                let discarded = shared.queue.clear();
                let abandoned = shared.in_flight.get();
                shared.abandoned.fetch_add(abandoned, Ordering::SeqCst);
                shared.manual_break.store(true, Ordering::SeqCst);
                warn!(discarded, abandoned, waited = ?started.elapsed(), "Manual break, no longer waiting");
                return Ok(());
            }
            next_prompt = Instant::now() + shared.config.drain_prompt_after;
        }
    }
    debug!(waited = ?started.elapsed(), "drain: complete");
    Ok(())
}

/// One line per failure with its serialized payload
pub(crate) fn format_failure(failure: &Failure) -> String {
    let payload = failure
        .task
        .payload_json()
        .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
        .unwrap_or_else(|e| format!("<unserializable: {}>", e));
    format!(
        "{} {} cause: {} data: {}",
        failure.task.kind(),
        failure.task.name().unwrap_or("-"),
        failure.cause,
        payload
    )
}

fn print_report(failures: &[Failure]) {
    println!(
        "{}",
        format!("There were {} failures. The following imports failed:", failures.len())
            .bright_red()
            .bold()
    );
    for failure in failures {
        println!("  {}", format_failure(failure));
    }
}

pub(crate) async fn run(shared: &Shared) -> Result<BarrierStep, PipelineError> {
    let round = shared.round.load(Ordering::SeqCst);
    debug!(round, "barrier::run: called");

    if let Err(reason) = shared.handler.check_liveness().await {
        error!(%reason, "Liveness check failed at end of import");
        return Err(PipelineError::Liveness(reason));
    }

    drain(shared).await?;
    let elapsed = shared.started.elapsed();
    info!(?elapsed, round, "Completed import");

    let finished = |residual: Vec<Failure>| {
        BarrierStep::Finished(RunOutcome {
            rounds: round,
            stats: shared.stats.snapshot(),
            residual,
            elapsed,
            manual_break: shared.manual_break.load(Ordering::SeqCst),
            abandoned: shared.abandoned.load(Ordering::SeqCst),
        })
    };

    if shared.failures.is_empty() {
        return Ok(finished(Vec::new()));
    }

    let failures = shared.failures.snapshot();
    print_report(&failures);

    let replays = round.saturating_sub(1);
    if replays >= shared.config.max_replay_rounds {
        warn!(replays, failures = failures.len(), "Replay limit reached, finishing with failures");
        return Ok(finished(failures));
    }

    if !ask(&shared.operator, RETRY_QUESTION).await? {
        info!(failures = failures.len(), "Not retrying failures");
        return Ok(finished(failures));
    }

    let replay: Vec<Task> = shared
        .failures
        .drain()
        .into_iter()
        .map(|failure| {
            info!(task = %failure.task, "Re-queuing");
            failure.task
        })
        .chain(std::iter::once(Task::End))
        .collect();
    shared.round.fetch_add(1, Ordering::SeqCst);
    shared.queue.push_all(replay);
    Ok(BarrierStep::Replay)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Entry, GroupRecord};

    #[test]
    fn test_format_failure_includes_payload() {
        let failure = Failure {
            task: Task::Group(Entry::new(
                0,
                "devs",
                GroupRecord {
                    name: "devs".to_string(),
                    ..Default::default()
                },
            )),
            cause: "unexpected HTTP 400: bad".to_string(),
        };
        let line = format_failure(&failure);
        assert!(line.starts_with("group devs cause: unexpected HTTP 400: bad data: {"));
        assert!(line.contains(r#""name":"devs""#));
    }
}
