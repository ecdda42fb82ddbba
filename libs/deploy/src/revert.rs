//! Following a scheduler-initiated auto-revert after a failed deployment.

use std::time::Duration;

use convoy_api::Deployment;
use tracing::{debug, error, info};

use crate::context::DeployContext;
use crate::watcher::watch_deployment;

/// How following an auto-revert ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RevertOutcome {
    /// No task group of the failed deployment has auto-revert enabled.
    NotEnabled,
    /// The revert deployment succeeded.
    Recovered,
    /// The revert deployment failed too.
    RevertFailed,
    /// No new deployment appeared within the attempt budget.
    Untracked,
    /// The latest deployment could not be read.
    LookupFailed,
}

/// Watch the revert deployment the scheduler starts after `failed`, if any.
///
/// Best-effort: the outcome is for logging and tests only, the failed
/// deployment stays failed either way.
pub async fn follow_auto_revert(ctx: &DeployContext, failed: &Deployment) -> RevertOutcome {
    let job_id = failed.job_id.as_str();

    if !failed.has_auto_revert() {
        error!(
            deployment_id = %failed.id,
            "job {} is not in auto-revert; POTENTIAL OUTAGE SITUATION",
            job_id
        );
        return RevertOutcome::NotEnabled;
    }

    info!(
        deployment_id = %failed.id,
        "job {} has entered auto-revert state; launching auto-revert checker",
        job_id
    );

    let mut query = ctx.query();
    if !failed.namespace.is_empty() {
        query.namespace = Some(failed.namespace.clone());
    }
    let tuning = ctx.tuning();

    for attempt in 1..=tuning.revert_attempts {
        let latest = match ctx.client().latest_deployment(job_id, &query).await {
            Ok(response) => response.value,
            Err(e) => {
                error!(error = %e, "unable to query latest deployment of job {}", job_id);
                return RevertOutcome::LookupFailed;
            }
        };

        match latest {
            Some(revert) if revert.id != failed.id => {
                info!(deployment_id = %revert.id, "beginning deployment watcher for job {}", job_id);
                if watch_deployment(ctx, &revert.id, Duration::ZERO).await {
                    info!("auto-revert of job {} was successful", job_id);
                    return RevertOutcome::Recovered;
                }
                error!(
                    deployment_id = %revert.id,
                    "auto-revert of job {} failed; POTENTIAL OUTAGE SITUATION",
                    job_id
                );
                return RevertOutcome::RevertFailed;
            }
            _ => {
                debug!(attempt, "auto-revert deployment not triggered for job {}, rechecking", job_id);
                if attempt < tuning.revert_attempts {
                    tokio::time::sleep(tuning.revert_interval).await;
                }
            }
        }
    }

    error!("unable to check auto-revert of job {}", job_id);
    RevertOutcome::Untracked
}
