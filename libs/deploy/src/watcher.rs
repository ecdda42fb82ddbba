//! Long-poll watcher that follows a deployment to its outcome.

use std::time::Duration;

use convoy_api::deployment::{DEPLOYMENT_STATUS_RUNNING, DEPLOYMENT_STATUS_SUCCESSFUL};
use tokio::time::Instant;
use tracing::{debug, error, info, warn, Instrument};

use crate::canary::{run_promoter, Handshake};
use crate::context::DeployContext;
use crate::index::IndexGate;
use crate::inspector::{inspect_failures, FailureSource};
use crate::retry::with_retry;

/// Wait index of the first deployment query.
const INITIAL_WAIT_INDEX: u64 = 1;

enum Outcome {
    Succeeded,
    /// The canary promoter gave up.
    Aborted,
    /// The deployment reached a failed status.
    Failed,
    /// The deployment could not be read.
    Unreachable,
}

/// Follow `deployment_id` until it succeeds or fails.
///
/// With a non-zero `canary_delay` a canary promoter runs alongside the watch
/// loop; if it gives up, the watch fails. On a failed status the allocations
/// of the deployment are inspected before returning.
pub async fn watch_deployment(
    ctx: &DeployContext,
    deployment_id: &str,
    canary_delay: Duration,
) -> bool {
    let span = tracing::info_span!(parent: ctx.span(), "watch", deployment_id = %deployment_id);
    watch(ctx, deployment_id, canary_delay).instrument(span).await
}

async fn watch(ctx: &DeployContext, deployment_id: &str, canary_delay: Duration) -> bool {
    let handshake = Handshake::new();
    let promoter = (!canary_delay.is_zero()).then(|| {
        tokio::spawn(
            run_promoter(
                ctx.clone(),
                deployment_id.to_string(),
                canary_delay,
                handshake.clone(),
            )
            .in_current_span(),
        )
    });

    let started = Instant::now();
    let mut gate = IndexGate::new(INITIAL_WAIT_INDEX);

    let outcome = loop {
        let query = ctx.blocking_query(gate.last());
        let poll = with_retry(&ctx.tuning().retry, "deployment lookup", || {
            ctx.client().deployment_info(deployment_id, &query)
        });

        let response = tokio::select! {
            biased;
            _ = handshake.cancelled() => None,
            response = poll => Some(response),
        };

        debug!(
            "deployment {} running for {:.2}s",
            deployment_id,
            started.elapsed().as_secs_f64()
        );

        if handshake.is_aborted() {
            break Outcome::Aborted;
        }
        let Some(response) = response else {
            break Outcome::Aborted;
        };

        let response = match response {
            Ok(response) => response,
            Err(e) => {
                error!(error = %e, "unable to get info of deployment {}", deployment_id);
                break Outcome::Unreachable;
            }
        };

        if !gate.advance(response.meta.last_index) {
            continue;
        }

        match response.value.status.as_str() {
            DEPLOYMENT_STATUS_RUNNING => continue,
            DEPLOYMENT_STATUS_SUCCESSFUL => {
                info!("deployment {} has completed successfully", deployment_id);
                break Outcome::Succeeded;
            }
            status => {
                error!(status, "deployment {} has status {}", deployment_id, status);
                break Outcome::Failed;
            }
        }
    };

    handshake.complete();
    if let Some(promoter) = promoter {
        if let Err(e) = promoter.await {
            warn!(error = %e, "canary promoter task did not finish cleanly");
        }
    }

    match outcome {
        Outcome::Succeeded => true,
        Outcome::Failed => {
            inspect_failures(ctx, FailureSource::Deployment(deployment_id)).await;
            false
        }
        Outcome::Aborted | Outcome::Unreachable => false,
    }
}
