//! Dispatching instances of parameterized jobs.

use std::collections::BTreeMap;

use tracing::{error, info, Instrument};

use crate::context::DeployContext;
use crate::evaluation::inspect_evaluation;
use crate::status::check_job_status;

/// Dispatch `job_id` with `meta` and `payload`, then follow the dispatched
/// child job until its tasks settle.
pub async fn trigger_dispatch(
    ctx: &DeployContext,
    job_id: &str,
    meta: &BTreeMap<String, String>,
    payload: &[u8],
) -> bool {
    let ctx = ctx.for_job(job_id);
    let span = ctx.span().clone();
    dispatch(&ctx, job_id, meta, payload).instrument(span).await
}

async fn dispatch(
    ctx: &DeployContext,
    job_id: &str,
    meta: &BTreeMap<String, String>,
    payload: &[u8],
) -> bool {
    let response = match ctx
        .client()
        .dispatch_job(job_id, meta, payload, ctx.write_options())
        .await
    {
        Ok(response) => response,
        Err(e) => {
            error!(error = %e, "unable to dispatch job {}", job_id);
            return false;
        }
    };

    info!("triggering dispatch against job {}", job_id);

    if response.eval_id.is_empty() {
        error!("dispatched job {} did not return evaluation", job_id);
        return false;
    }

    let child = ctx.for_job(&response.dispatched_job_id);
    info!(
        eval_id = %response.eval_id,
        dispatched_job_id = %response.dispatched_job_id,
        "dispatched job {}",
        response.dispatched_job_id
    );

    if let Err(e) = inspect_evaluation(&child, &response.eval_id).await {
        error!(error = %e, "dispatch of job {} failed", job_id);
        return false;
    }

    if !check_job_status(&child, &response.dispatched_job_id, Some(&response.eval_id)).await {
        error!("dispatch of job {} failed", job_id);
        return false;
    }

    info!("dispatch of job {} successful", job_id);
    true
}
