//! Evaluation inspection and deployment id discovery.

use convoy_api::Evaluation;
use tracing::{debug, error, info};

use crate::context::DeployContext;
use crate::error::{DeployError, Result};
use crate::index::IndexGate;
use crate::retry::with_retry;

/// Poll an evaluation until it reaches a terminal status.
///
/// Placement failures are logged but are not an error: a partially placed
/// evaluation can still lead to a successful rollout.
pub async fn inspect_evaluation(ctx: &DeployContext, eval_id: &str) -> Result<Evaluation> {
    let tuning = ctx.tuning();
    let mut gate = IndexGate::default();

    loop {
        let query = ctx.blocking_query(gate.last());
        let response = with_retry(&tuning.retry, "evaluation lookup", || {
            ctx.client().evaluation_info(eval_id, &query)
        })
        .await
        .map_err(|e| {
            error!(eval_id, error = %e, "unable to query evaluation");
            e
        })?;

        let eval = response.value;
        if eval.is_terminal() {
            if eval.failed_tg_allocs.is_empty() {
                info!(eval_id, status = %eval.status, "evaluation {} finished successfully", eval_id);
            } else {
                log_placement_failures(&eval);
            }
            return Ok(eval);
        }

        debug!(eval_id, status = %eval.status, "evaluation not yet terminal");
        if !gate.advance(response.meta.last_index) {
            tokio::time::sleep(tuning.eval_poll_interval).await;
        }
    }
}

/// Log, per task group, why allocations could not be placed.
pub fn log_placement_failures(eval: &Evaluation) {
    for (group, metric) in &eval.failed_tg_allocs {
        if metric.nodes_exhausted > 0 {
            let classes: Vec<&str> = metric.class_exhausted.keys().map(String::as_str).collect();
            let dimensions: Vec<&str> = metric
                .dimension_exhausted
                .keys()
                .map(String::as_str)
                .collect();
            error!(
                eval_id = %eval.id,
                task_group = %group,
                nodes_exhausted = metric.nodes_exhausted,
                "task group {} failed to place allocs, failed on {:?} and exhausted {:?}",
                group,
                classes,
                dimensions
            );
        }

        for class in metric.class_filtered.keys() {
            error!(
                eval_id = %eval.id,
                task_group = %group,
                "task group {} failed to place {} allocs as class \"{}\" was filtered",
                group,
                metric.class_filtered.len(),
                class
            );
        }

        for constraint in metric.constraint_filtered.keys() {
            error!(
                eval_id = %eval.id,
                task_group = %group,
                "task group {} failed to place {} allocs as constraint \"{}\" was filtered",
                group,
                metric.constraint_filtered.len(),
                constraint
            );
        }
    }
}

/// Wait for the scheduler to attach a deployment to a fresh evaluation.
pub async fn await_deployment_id(ctx: &DeployContext, eval_id: &str) -> Result<String> {
    let tuning = ctx.tuning();
    let lookup = async {
        loop {
            let query = ctx.query();
            let eval = with_retry(&tuning.retry, "evaluation lookup", || {
                ctx.client().evaluation_info(eval_id, &query)
            })
            .await?
            .value;

            if !eval.deployment_id.is_empty() {
                return Ok::<_, DeployError>(eval.deployment_id);
            }

            debug!(eval_id, "scheduler returned an empty deployment for evaluation; retrying");
            tokio::time::sleep(tuning.deployment_id_interval).await;
        }
    };

    match tokio::time::timeout(tuning.deployment_id_timeout, lookup).await {
        Ok(result) => result,
        Err(_) => {
            error!(eval_id, "timeout reached on attempting to find deployment ID");
            Err(DeployError::timeout(
                format!("deployment of evaluation {}", eval_id),
                tuning.deployment_id_timeout,
            ))
        }
    }
}
