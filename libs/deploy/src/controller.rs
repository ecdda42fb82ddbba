//! The deployment controller: validate, register, then follow the rollout
//! with whichever tracker fits the job's kind.

use std::time::Duration;

use convoy_api::Job;
use tracing::{debug, error, info, warn, Instrument};

use crate::context::DeployContext;
use crate::error::{DeployError, Result};
use crate::evaluation::{await_deployment_id, inspect_evaluation};
use crate::kind::JobKind;
use crate::revert::follow_auto_revert;
use crate::status::check_job_status;
use crate::watcher::watch_deployment;

const JOB_STATUS_RUNNING: &str = "running";

/// Per-deployment options.
#[derive(Debug, Clone, Default)]
pub struct DeployOptions {
    /// Promote canaries once they have all been healthy for this long.
    /// Zero disables auto-promotion.
    pub canary_auto_promote: Duration,

    /// Force a run of a periodic job right after registering it.
    pub force_batch: bool,

    /// Keep the job file's group counts instead of the running job's.
    pub force_count: bool,

    /// Vault token attached to the job before registration.
    pub vault_token: Option<String>,
}

/// Register `job` and follow it to a terminal state.
///
/// Returns `true` only once the rollout is known to have succeeded. Every
/// failure is logged before returning `false`. `job` is updated in place
/// with dynamic counts and the Vault token.
pub async fn trigger_deployment(
    ctx: &DeployContext,
    job: &mut Job,
    options: &DeployOptions,
) -> bool {
    let Some(job_id) = job.id().map(str::to_string) else {
        error!(error = %DeployError::MissingName, "unable to set up deployment");
        return false;
    };

    let ctx = ctx.for_job(&job_id);
    let span = ctx.span().clone();

    async {
        let kind = match pre_deploy_validate(&ctx, job, options).await {
            Ok(kind) => kind,
            Err(e) => {
                error!(error = %e, "pre-deployment validation process failed");
                return false;
            }
        };

        match deploy(&ctx, &job_id, job, &kind, options).await {
            Ok(true) => {
                info!("job deployment successful");
                true
            }
            Ok(false) => {
                error!("job deployment failed");
                false
            }
            Err(e) => {
                error!(error = %e, "job deployment failed");
                false
            }
        }
    }
    .instrument(span)
    .await
}

/// Validation gates run before anything is written to the scheduler.
async fn pre_deploy_validate(
    ctx: &DeployContext,
    job: &mut Job,
    options: &DeployOptions,
) -> Result<JobKind> {
    let validation = ctx
        .client()
        .validate_job(job, ctx.write_options())
        .await
        .map_err(|e| {
            error!(error = %e, "job validation failed");
            e
        })?;
    if let Some(failure) = validation.failure() {
        return Err(DeployError::Validation(failure));
    }
    if !validation.warnings.is_empty() {
        warn!(warnings = %validation.warnings, "job validation returned warnings");
    }

    let kind = JobKind::classify(job)?;

    if !options.canary_auto_promote.is_zero() && !job.is_canary_enabled() {
        return Err(DeployError::CanaryNotEnabled);
    }
    if options.force_batch && !job.is_periodic() {
        return Err(DeployError::NotPeriodic);
    }

    if !options.force_count {
        update_dynamic_counts(ctx, job).await?;
    }

    if let Some(group) = job
        .task_groups
        .iter()
        .find(|group| group.count.is_some_and(|count| count < 0))
    {
        return Err(DeployError::NegativeCount {
            group: group.name.clone().unwrap_or_default(),
            count: group.count.unwrap_or_default(),
        });
    }

    Ok(kind)
}

/// Carry group counts over from the running job so that external scaling
/// survives a redeploy.
async fn update_dynamic_counts(ctx: &DeployContext, job: &mut Job) -> Result<()> {
    let Some(name) = job.name().map(str::to_string) else {
        return Err(DeployError::MissingName);
    };

    let remote = match ctx.client().job_info(&name, &ctx.query()).await {
        Ok(response) => response.value,
        Err(e) if e.is_not_found() => {
            info!("job is not running, using template file group counts");
            return Ok(());
        }
        Err(e) => {
            error!(error = %e, "unable to look up running job for dynamic counts");
            return Err(e.into());
        }
    };

    if remote.status.as_deref() != Some(JOB_STATUS_RUNNING) {
        return Ok(());
    }

    debug!("running dynamic job count updater");
    for remote_group in &remote.task_groups {
        let (Some(group_name), Some(count)) = (remote_group.name.as_deref(), remote_group.count)
        else {
            continue;
        };
        if let Some(group) = job.task_group_mut(group_name) {
            info!(group = group_name, count, "using dynamic count {} for group {}", count, group_name);
            group.count = Some(count);
        }
    }
    Ok(())
}

async fn deploy(
    ctx: &DeployContext,
    job_id: &str,
    job: &mut Job,
    kind: &JobKind,
    options: &DeployOptions,
) -> Result<bool> {
    if job.is_zero_count() {
        info!("all task groups have a count of zero; nothing to deploy");
        return Ok(true);
    }

    info!("triggering a deployment");

    if let Some(token) = &options.vault_token {
        job.vault_token = Some(token.clone());
    }

    let registration = ctx
        .client()
        .register_job(job, ctx.write_options())
        .await
        .map_err(|e| {
            error!(error = %e, "unable to register job");
            e
        })?;
    if !registration.warnings.is_empty() {
        warn!(warnings = %registration.warnings, "job registration returned warnings");
    }

    let mut eval_id = registration.eval_id;
    if options.force_batch {
        info!("triggering a run of periodic job");
        eval_id = ctx
            .client()
            .periodic_force(job_id, ctx.write_options())
            .await
            .map_err(|e| {
                error!(error = %e, "unable to trigger periodic instance of job");
                e
            })?;
    }

    // Periodic and parameterized registrations create no evaluation unless
    // a periodic run was forced.
    let periodic = job.is_periodic();
    let expects_eval =
        (!periodic && !job.is_parameterized()) || (periodic && options.force_batch);
    if expects_eval {
        if eval_id.is_empty() {
            return Err(DeployError::NoEvaluation(format!("registration of job {}", job_id)));
        }
        inspect_evaluation(ctx, &eval_id).await?;
    }
    let tracked_eval = (!eval_id.is_empty()).then_some(eval_id.as_str());

    match kind {
        JobKind::Service { canary, .. } if kind.uses_deployments() => {
            let canary = *canary;
            let Some(eval_id) = tracked_eval else {
                return Err(DeployError::NoEvaluation(format!("registration of job {}", job_id)));
            };

            info!("beginning deployment watcher for job");
            let deployment_id = await_deployment_id(ctx, eval_id).await?;
            if watch_deployment(ctx, &deployment_id, options.canary_auto_promote).await {
                return Ok(true);
            }

            if !canary {
                let failed = ctx
                    .client()
                    .deployment_info(&deployment_id, &ctx.query())
                    .await
                    .map_err(|e| {
                        error!(
                            deployment_id = %deployment_id,
                            error = %e,
                            "unable to query deployment {} for auto-revert check",
                            deployment_id
                        );
                        e
                    })?
                    .value;
                follow_auto_revert(ctx, &failed).await;
            }
            Ok(false)
        }
        JobKind::Service { .. } => {
            info!("job is not configured with update stanza, consider adding to use deployments");
            Ok(check_job_status(ctx, job_id, tracked_eval).await)
        }
        JobKind::Batch | JobKind::System => Ok(check_job_status(ctx, job_id, tracked_eval).await),
        JobKind::Unsupported(job_type) => {
            debug!(job_type = %job_type, "advanced deployments of job type {} are not supported", job_type);
            Ok(true)
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use convoy_api::mock::Op;
    use convoy_api::{
        MockReply, MockScheduler, PeriodicConfig, TaskGroup, ValidationResponse, WriteOptions,
    };
    use rstest::rstest;

    use super::*;

    fn group(name: &str, count: Option<i64>) -> TaskGroup {
        TaskGroup {
            name: Some(name.to_string()),
            count,
            ..TaskGroup::default()
        }
    }

    fn job(job_type: &str, groups: Vec<TaskGroup>) -> Job {
        Job {
            id: Some("web".to_string()),
            name: Some("web".to_string()),
            job_type: Some(job_type.to_string()),
            task_groups: groups,
            ..Job::default()
        }
    }

    fn ctx(mock: &Arc<MockScheduler>) -> DeployContext {
        DeployContext::new(mock.clone(), WriteOptions::default())
    }

    #[tokio::test(start_paused = true)]
    async fn test_missing_type_stops_before_register() {
        let mock = Arc::new(MockScheduler::new());
        let mut job = job("", vec![group("web", Some(1))]);

        assert!(!trigger_deployment(&ctx(&mock), &mut job, &DeployOptions::default()).await);
        assert_eq!(mock.calls(Op::ValidateJob), 1);
        assert_eq!(mock.calls(Op::RegisterJob), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_validation_errors_stop_deployment() {
        let mock = Arc::new(MockScheduler::new());
        mock.script_validation(vec![MockReply::ok(
            ValidationResponse {
                validation_errors: vec!["missing datacenters".to_string()],
                ..ValidationResponse::default()
            },
            0,
        )]);
        let mut job = job("service", vec![group("web", Some(1))]);

        assert!(!trigger_deployment(&ctx(&mock), &mut job, &DeployOptions::default()).await);
        assert_eq!(mock.calls(Op::RegisterJob), 0);
    }

    #[rstest]
    #[case(
        DeployOptions { canary_auto_promote: Duration::from_secs(30), ..DeployOptions::default() },
        "canary"
    )]
    #[case(DeployOptions { force_batch: true, ..DeployOptions::default() }, "periodic")]
    #[tokio::test(start_paused = true)]
    async fn test_incompatible_options(#[case] options: DeployOptions, #[case] expected: &str) {
        let mock = Arc::new(MockScheduler::new());
        let mut job = job("service", vec![group("web", Some(1))]);

        let err = pre_deploy_validate(&ctx(&mock), &mut job, &options)
            .await
            .unwrap_err();
        assert!(err.to_string().contains(expected));
    }

    #[tokio::test(start_paused = true)]
    async fn test_negative_count_is_rejected() {
        let mock = Arc::new(MockScheduler::new());
        let mut job = job("batch", vec![group("web", Some(-1))]);

        let err = pre_deploy_validate(&ctx(&mock), &mut job, &DeployOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, DeployError::NegativeCount { count: -1, .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_dynamic_counts_from_running_job() {
        let mock = Arc::new(MockScheduler::new());
        let mut remote = job("service", vec![group("web", Some(7)), group("other", Some(2))]);
        remote.status = Some("running".to_string());
        mock.script_job("web", vec![MockReply::ok(remote, 4)]);

        let mut local = job("service", vec![group("web", Some(3)), group("cache", Some(1))]);
        pre_deploy_validate(&ctx(&mock), &mut local, &DeployOptions::default())
            .await
            .unwrap();

        assert_eq!(local.task_groups[0].count, Some(7));
        assert_eq!(local.task_groups[1].count, Some(1));
    }

    #[rstest]
    #[case(Some("dead"), false)]
    #[case(Some("running"), true)]
    #[tokio::test(start_paused = true)]
    async fn test_dynamic_counts_skipped(#[case] status: Option<&str>, #[case] force_count: bool) {
        let mock = Arc::new(MockScheduler::new());
        let mut remote = job("service", vec![group("web", Some(7))]);
        remote.status = status.map(str::to_string);
        mock.script_job("web", vec![MockReply::ok(remote, 4)]);

        let mut local = job("service", vec![group("web", Some(3))]);
        let options = DeployOptions {
            force_count,
            ..DeployOptions::default()
        };
        pre_deploy_validate(&ctx(&mock), &mut local, &options)
            .await
            .unwrap();

        assert_eq!(local.task_groups[0].count, Some(3));
    }

    #[tokio::test(start_paused = true)]
    async fn test_dynamic_count_lookup_error_fails() {
        let mock = Arc::new(MockScheduler::new());
        mock.script_job("web", vec![MockReply::error(403, "permission denied")]);

        let mut local = job("service", vec![group("web", Some(3))]);
        let result = pre_deploy_validate(&ctx(&mock), &mut local, &DeployOptions::default()).await;
        assert!(matches!(result, Err(DeployError::Api(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_periodic_job_without_force_skips_evaluation() {
        let mock = Arc::new(MockScheduler::new());
        let mut periodic = job("batch", vec![group("report", Some(1))]);
        periodic.periodic = Some(PeriodicConfig::default());
        let mut remote = periodic.clone();
        remote.status = Some("running".to_string());
        // Answers both the dynamic count lookup and the status check.
        mock.script_job("web", vec![MockReply::ok(remote, 4)]);

        assert!(trigger_deployment(&ctx(&mock), &mut periodic, &DeployOptions::default()).await);
        assert_eq!(mock.calls(Op::EvaluationInfo), 0);
        assert_eq!(mock.calls(Op::EvaluationAllocations), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_force_batch_uses_periodic_evaluation() {
        let mock = Arc::new(MockScheduler::new());
        mock.script_periodic_force(vec![MockReply::ok(String::new(), 0)]);
        let mut periodic = job("batch", vec![group("report", Some(1))]);
        periodic.periodic = Some(PeriodicConfig::default());

        let options = DeployOptions {
            force_batch: true,
            force_count: true,
            ..DeployOptions::default()
        };
        assert!(!trigger_deployment(&ctx(&mock), &mut periodic, &options).await);
        assert_eq!(mock.calls(Op::PeriodicForce), 1);
        assert_eq!(mock.calls(Op::EvaluationInfo), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_vault_token_is_attached() {
        let mock = Arc::new(MockScheduler::new());
        let mut job = job("sysbatch", vec![group("web", Some(1))]);

        let options = DeployOptions {
            vault_token: Some("s.token".to_string()),
            force_count: true,
            ..DeployOptions::default()
        };
        // The registration reply has no evaluation.
        assert!(!trigger_deployment(&ctx(&mock), &mut job, &options).await);

        let registered = mock.registered_jobs();
        assert_eq!(registered.len(), 1);
        assert_eq!(registered[0].vault_token.as_deref(), Some("s.token"));
    }
}
