//! Following an already-registered job, by evaluation, to its final state.

use std::time::Duration;

use convoy_api::AllocationListStub;
use tracing::{debug, error, info, Instrument};

use crate::context::DeployContext;
use crate::error::{DeployError, Result};
use crate::index::IndexGate;
use crate::inspector::{inspect_allocations, unhealthy_allocations};
use crate::retry::with_retry;

const JOB_STATUS_RUNNING: &str = "running";
const JOB_STATUS_DEAD: &str = "dead";

/// Server-side wait of the monitor's job queries.
const MONITOR_WAIT: Duration = Duration::from_secs(10);

/// Follow the job that owns `eval_id` until it is `dead`, or `running` when
/// it is periodic or parameterized.
///
/// A dead job with failed tasks is an error. Once `timeout`, if any, passes
/// the allocations of the evaluation are inspected and a timeout error is
/// returned.
pub async fn monitor_evaluation(
    ctx: &DeployContext,
    eval_id: &str,
    timeout: Option<Duration>,
) -> Result<()> {
    let eval = ctx
        .client()
        .evaluation_info(eval_id, &ctx.query())
        .await
        .map_err(|e| {
            error!(eval_id, error = %e, "unable to get evaluation {}", eval_id);
            e
        })?
        .value;

    let ctx = ctx.for_job(&eval.job_id);
    let span = ctx.span().clone();

    async {
        let Some(timeout) = timeout else {
            return follow_job(&ctx, &eval.job_id, eval_id).await;
        };

        match tokio::time::timeout(timeout, follow_job(&ctx, &eval.job_id, eval_id)).await {
            Ok(result) => result,
            Err(_) => {
                error!("timeout reached while monitoring job {}", eval.job_id);
                let allocs = evaluation_allocations(&ctx, eval_id).await?;
                inspect_allocations(&ctx, &unhealthy_allocations(&allocs)).await;
                Err(DeployError::timeout(format!("job {}", eval.job_id), timeout))
            }
        }
    }
    .instrument(span)
    .await
}

async fn follow_job(ctx: &DeployContext, job_id: &str, eval_id: &str) -> Result<()> {
    let mut gate = IndexGate::default();

    loop {
        let query = ctx.query().blocking(gate.last(), MONITOR_WAIT);
        let response = with_retry(&ctx.tuning().retry, "job lookup", || {
            ctx.client().job_info(job_id, &query)
        })
        .await
        .map_err(|e| {
            error!(error = %e, "unable to query job {}", job_id);
            e
        })?;

        let job = response.value;
        let status = job.status.clone().unwrap_or_default();
        if !gate.advance(response.meta.last_index) {
            debug!(status = %status, "job {} currently has status {}", job_id, status);
            continue;
        }

        match status.as_str() {
            JOB_STATUS_DEAD => {
                let allocs = evaluation_allocations(ctx, eval_id).await?;
                let failed = failed_allocations(&allocs);
                if !failed.is_empty() {
                    inspect_allocations(ctx, &failed).await;
                    return Err(DeployError::TasksFailed(failed.len()));
                }
                info!(status = %status, "job {} has status {}", job_id, status);
                return Ok(());
            }
            JOB_STATUS_RUNNING => {
                info!(status = %status, "job {} has status {}", job_id, status);
                if job.is_parameterized() {
                    info!("job {} is parameterized; running is its final state", job_id);
                    return Ok(());
                }
                if job.is_periodic() {
                    info!("job {} is periodic; running is its final state", job_id);
                    return Ok(());
                }
            }
            _ => debug!(status = %status, "job {} has status {}; waiting", job_id, status),
        }
    }
}

async fn evaluation_allocations(
    ctx: &DeployContext,
    eval_id: &str,
) -> Result<Vec<AllocationListStub>> {
    let response = ctx
        .client()
        .evaluation_allocations(eval_id, &ctx.query())
        .await
        .map_err(|e| {
            error!(eval_id, error = %e, "unable to get allocations from evaluation {}", eval_id);
            e
        })?;
    Ok(response.value)
}

/// Ids of allocations with at least one failed task.
fn failed_allocations(allocs: &[AllocationListStub]) -> Vec<String> {
    allocs
        .iter()
        .filter(|alloc| alloc.task_states.values().any(|task| task.failed))
        .map(|alloc| alloc.id.clone())
        .collect()
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use convoy_api::mock::Op;
    use convoy_api::{
        Evaluation, Job, MockReply, MockScheduler, PeriodicConfig, TaskState, WriteOptions,
    };

    use super::*;

    fn eval() -> Evaluation {
        Evaluation {
            id: "e1".to_string(),
            job_id: "nightly".to_string(),
            status: "complete".to_string(),
            ..Evaluation::default()
        }
    }

    fn job(status: &str) -> Job {
        Job {
            id: Some("nightly".to_string()),
            status: Some(status.to_string()),
            ..Job::default()
        }
    }

    fn alloc(id: &str, state: &str, failed: bool) -> AllocationListStub {
        AllocationListStub {
            id: id.to_string(),
            task_states: [(
                "report".to_string(),
                TaskState {
                    state: state.to_string(),
                    failed,
                    events: Vec::new(),
                },
            )]
            .into(),
            ..AllocationListStub::default()
        }
    }

    fn setup() -> (Arc<MockScheduler>, DeployContext) {
        let mock = Arc::new(MockScheduler::new());
        mock.script_evaluation("e1", vec![MockReply::ok(eval(), 2)]);
        let ctx = DeployContext::new(mock.clone(), WriteOptions::default());
        (mock, ctx)
    }

    #[tokio::test(start_paused = true)]
    async fn test_clean_exit() {
        let (mock, ctx) = setup();
        mock.script_job(
            "nightly",
            vec![MockReply::ok(job("pending"), 3), MockReply::ok(job("dead"), 4)],
        );
        mock.script_evaluation_allocations("e1", vec![MockReply::ok(vec![alloc("a1", "dead", false)], 4)]);

        let result = monitor_evaluation(&ctx, "e1", Some(Duration::from_secs(60))).await;
        assert!(result.is_ok());
        assert_eq!(mock.calls(Op::AllocationInfo), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_tasks_are_inspected() {
        let (mock, ctx) = setup();
        mock.script_job("nightly", vec![MockReply::ok(job("dead"), 4)]);
        mock.script_evaluation_allocations(
            "e1",
            vec![MockReply::ok(
                vec![alloc("a1", "dead", true), alloc("a2", "dead", false)],
                4,
            )],
        );

        let result = monitor_evaluation(&ctx, "e1", Some(Duration::from_secs(60))).await;
        assert!(matches!(result, Err(DeployError::TasksFailed(1))));
        assert_eq!(mock.calls(Op::AllocationInfo), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_running_periodic_job_is_final() {
        let (mock, ctx) = setup();
        let mut periodic = job("running");
        periodic.periodic = Some(PeriodicConfig::default());
        mock.script_job("nightly", vec![MockReply::ok(periodic, 3)]);

        assert!(monitor_evaluation(&ctx, "e1", Some(Duration::from_secs(60))).await.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_inspects_allocations() {
        let (mock, ctx) = setup();
        mock.script_job("nightly", vec![MockReply::ok(job("running"), 3)]);
        mock.script_evaluation_allocations(
            "e1",
            vec![MockReply::ok(vec![alloc("a1", "pending", false)], 3)],
        );

        let start = tokio::time::Instant::now();
        let result = monitor_evaluation(&ctx, "e1", Some(Duration::from_secs(30))).await;

        assert!(matches!(result, Err(DeployError::Timeout { .. })));
        assert!(start.elapsed() >= Duration::from_secs(30));
        assert_eq!(mock.calls(Op::AllocationInfo), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unknown_evaluation() {
        let mock = Arc::new(MockScheduler::new());
        let ctx = DeployContext::new(mock, WriteOptions::default());
        assert!(monitor_evaluation(&ctx, "e1", None).await.is_err());
    }
}
