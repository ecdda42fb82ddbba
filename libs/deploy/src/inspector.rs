//! Failure diagnosis: explains why allocations under a deployment or
//! evaluation did not come up healthy.
//!
//! Diagnostic only. Every cause is emitted as a log line keyed by
//! `alloc_id` and `event_type`; nothing is returned to the caller.

use std::time::Duration;

use convoy_api::{AllocationListStub, TaskEvent, TaskEventKind};
use futures_util::future::join_all;
use tracing::{debug, error};

use crate::context::DeployContext;

/// What to enumerate allocations from.
#[derive(Debug, Clone, Copy)]
pub enum FailureSource<'a> {
    Deployment(&'a str),
    Evaluation(&'a str),
}

/// Inspect every allocation under `source` that has a task which is not
/// running or cleanly finished.
pub async fn inspect_failures(ctx: &DeployContext, source: FailureSource<'_>) {
    let query = ctx.query();
    let allocs = match source {
        FailureSource::Deployment(id) => ctx.client().deployment_allocations(id, &query).await,
        FailureSource::Evaluation(id) => ctx.client().evaluation_allocations(id, &query).await,
    };

    let allocs = match allocs {
        Ok(response) => response.value,
        Err(e) => {
            error!(error = %e, source = ?source, "unable to query allocations for failure inspection");
            return;
        }
    };

    let selected = unhealthy_allocations(&allocs);
    inspect_allocations(ctx, &selected).await;
}

/// Ids of allocations with at least one task that is not healthy.
pub fn unhealthy_allocations(allocs: &[AllocationListStub]) -> Vec<String> {
    allocs
        .iter()
        .filter(|alloc| alloc.task_states.values().any(|task| !task.is_healthy()))
        .map(|alloc| alloc.id.clone())
        .collect()
}

/// Inspect the given allocations concurrently and wait for all of them.
pub async fn inspect_allocations(ctx: &DeployContext, alloc_ids: &[String]) {
    if alloc_ids.is_empty() {
        return;
    }

    let inspections = alloc_ids.iter().map(|id| {
        debug!(alloc_id = %id, "launching allocation inspector");
        inspect_allocation(ctx, id)
    });
    join_all(inspections).await;
}

async fn inspect_allocation(ctx: &DeployContext, alloc_id: &str) {
    let alloc = match ctx.client().allocation_info(alloc_id, &ctx.query()).await {
        Ok(response) => response.value,
        Err(e) => {
            error!(alloc_id, error = %e, "unable to query allocation");
            return;
        }
    };

    for (task, state) in &alloc.task_states {
        for event in &state.events {
            let event_type = event.event_type.to_lowercase();
            match describe_event(event) {
                Some(desc) => error!(
                    alloc_id,
                    task = %task,
                    event_type = %event_type,
                    "alloc {} incurred event {} because {}",
                    alloc_id,
                    event_type,
                    desc
                ),
                None => error!(
                    alloc_id,
                    task = %task,
                    event_type = %event_type,
                    "alloc {} logged for failure; event_type: {}; message: {}",
                    alloc_id,
                    event_type,
                    event.display_message.to_lowercase()
                ),
            }
        }
    }
}

/// Human-readable cause of a task event, if its type carries one.
pub fn describe_event(event: &TaskEvent) -> Option<String> {
    let desc = match event.kind() {
        TaskEventKind::FailedValidation => or_default(&event.validation_error, "validation of task failed"),
        TaskEventKind::SetupFailure => or_default(&event.setup_error, "task setup failed"),
        TaskEventKind::DriverFailure => or_default(&event.driver_error, "failed to start task"),
        TaskEventKind::ArtifactDownloadFailed => {
            or_default(&event.download_error, "the task failed to download artifacts")
        }
        TaskEventKind::Killing => {
            if !event.kill_reason.is_empty() {
                format!("the task was killed: {}", event.kill_reason)
            } else if event.kill_timeout > 0 {
                let timeout = Duration::from_nanos(event.kill_timeout.unsigned_abs());
                format!("sent interrupt, waiting {:?} before force killing", timeout)
            } else {
                "the task was sent interrupt".to_string()
            }
        }
        TaskEventKind::Killed => or_default(&event.kill_error, "the task was successfully killed"),
        TaskEventKind::Terminated => {
            let mut parts = vec![format!("exit Code {}", event.exit_code)];
            if event.signal != 0 {
                parts.push(format!("signal {}", event.signal));
            }
            if !event.message.is_empty() {
                parts.push(format!("exit message {:?}", event.message));
            }
            parts.join(", ")
        }
        TaskEventKind::NotRestarting => {
            or_default(&event.restart_reason, "the task exceeded restart policy")
        }
        TaskEventKind::SiblingFailed => {
            if event.failed_sibling.is_empty() {
                "task's sibling failed".to_string()
            } else {
                format!("task's sibling {:?} failed", event.failed_sibling)
            }
        }
        TaskEventKind::LeaderDead => "leader task in group is dead".to_string(),
        TaskEventKind::Other => return None,
    };

    Some(desc.trim().to_string())
}

fn or_default(detail: &str, fallback: &str) -> String {
    if detail.is_empty() {
        fallback.to_string()
    } else {
        detail.to_string()
    }
}
