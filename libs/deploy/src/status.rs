//! Terminal-state tracking for jobs the scheduler does not follow with a
//! deployment: batch, system, periodic, dispatched, and service jobs without
//! an update policy.

use std::collections::{BTreeMap, BTreeSet};

use convoy_api::allocation::{TASK_STATE_DEAD, TASK_STATE_PENDING, TASK_STATE_RUNNING};
use convoy_api::AllocationListStub;
use tracing::{debug, error, info, Instrument};

use crate::context::DeployContext;
use crate::index::IndexGate;
use crate::retry::with_retry;

const JOB_STATUS_RUNNING: &str = "running";
const JOB_STATUS_PENDING: &str = "pending";
const JOB_STATUS_DEAD: &str = "dead";

/// Placeholder state of a task that has been discovered but not yet observed.
const UNKNOWN_STATE: &str = "unknown";

/// Check that a job came up, then, given an evaluation, that every task it
/// placed reached `running`.
pub async fn check_job_status(ctx: &DeployContext, job_id: &str, eval_id: Option<&str>) -> bool {
    async {
        debug!("running job status checker for job");

        let running = simple_status_check(ctx, job_id).await;
        match eval_id {
            Some(eval_id) if running => check_allocations(ctx, eval_id).await,
            _ => running,
        }
    }
    .instrument(ctx.span().clone())
    .await
}

/// Long-poll the job until it is `running` (success) or `dead` (failure).
async fn simple_status_check(ctx: &DeployContext, job_id: &str) -> bool {
    let mut gate = IndexGate::default();

    loop {
        let query = ctx.blocking_query(gate.last());
        let response = match with_retry(&ctx.tuning().retry, "job lookup", || {
            ctx.client().job_info(job_id, &query)
        })
        .await
        {
            Ok(response) => response,
            Err(e) => {
                error!(error = %e, "unable to query job information");
                return false;
            }
        };

        if !gate.advance(response.meta.last_index) {
            continue;
        }

        let status = response.value.status.unwrap_or_default();
        match status.as_str() {
            JOB_STATUS_RUNNING => {
                info!(status = %status, "job has status {}", status);
                return true;
            }
            JOB_STATUS_DEAD => {
                error!(status = %status, "job has status {}", status);
                return false;
            }
            JOB_STATUS_PENDING => debug!(status = %status, "job has status {}", status),
            _ => debug!(status = %status, "job has unexpected status {}", status),
        }
    }
}

/// Long-poll the evaluation's allocations until every task is settled.
async fn check_allocations(ctx: &DeployContext, eval_id: &str) -> bool {
    let mut tracker = TaskTracker::default();
    let mut gate = IndexGate::default();

    loop {
        let query = ctx.blocking_query(gate.last());
        let response = match with_retry(&ctx.tuning().retry, "allocation lookup", || {
            ctx.client().evaluation_allocations(eval_id, &query)
        })
        .await
        {
            Ok(response) => response,
            Err(e) => {
                error!(eval_id, error = %e, "unable to query allocations of job");
                return false;
            }
        };

        if !gate.advance(response.meta.last_index) {
            continue;
        }

        match tracker.observe(&response.value) {
            Progress::Waiting => debug!(eval_id, "no allocations placed yet"),
            Progress::Tracking(remaining) => debug!(eval_id, remaining, "tasks still pending"),
            Progress::Finished { failed: 0 } => {
                info!(eval_id, "all allocations in deployment of job are running");
                return true;
            }
            Progress::Finished { failed } => {
                error!(eval_id, failed, "{} task(s) in deployment of job are dead", failed);
                return false;
            }
        }
    }
}

/// An (allocation, task) pair.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TaskCoordinate {
    pub alloc_id: String,
    pub task: String,
}

/// Result of feeding one allocation snapshot to a [`TaskTracker`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Progress {
    /// No task has been discovered yet.
    Waiting,
    /// This many tasks are still tracked.
    Tracking(usize),
    /// Nothing left to track.
    Finished { failed: usize },
}

/// Per-task state tracking for the allocation checker.
///
/// A task is tracked from its first appearance until it reaches `running`
/// or `dead`; `dead` counts as a failure. Settled tasks are never tracked
/// again.
#[derive(Debug, Default)]
pub struct TaskTracker {
    tracked: BTreeMap<TaskCoordinate, String>,
    settled: BTreeSet<TaskCoordinate>,
    failed: usize,
}

impl TaskTracker {
    pub fn observe(&mut self, allocs: &[AllocationListStub]) -> Progress {
        for alloc in allocs {
            for (task, state) in &alloc.task_states {
                let coord = TaskCoordinate {
                    alloc_id: alloc.id.clone(),
                    task: task.clone(),
                };
                if self.settled.contains(&coord) {
                    continue;
                }

                let last = self
                    .tracked
                    .entry(coord.clone())
                    .or_insert_with(|| UNKNOWN_STATE.to_string());
                if *last != state.state {
                    info!(
                        alloc_id = %alloc.id,
                        task = %task,
                        state = %state.state,
                        "task {} in allocation {} now in {} state",
                        task,
                        alloc.id,
                        state.state
                    );
                    last.clone_from(&state.state);
                }

                match state.state.as_str() {
                    TASK_STATE_RUNNING => self.settle(coord),
                    TASK_STATE_DEAD => {
                        self.failed += 1;
                        self.settle(coord);
                    }
                    TASK_STATE_PENDING => {
                        debug!(alloc_id = %alloc.id, task = %task, "task is pending");
                    }
                    _ => {}
                }
            }
        }

        if self.tracked.is_empty() {
            if self.settled.is_empty() {
                return Progress::Waiting;
            }
            return Progress::Finished {
                failed: self.failed,
            };
        }
        Progress::Tracking(self.tracked.len())
    }

    fn settle(&mut self, coord: TaskCoordinate) {
        self.tracked.remove(&coord);
        self.settled.insert(coord);
    }

}
