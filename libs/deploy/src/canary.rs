//! Canary auto-promotion and its handshake with the deployment watcher.
//!
//! The watcher and the promoter share a [`Handshake`]: a small state machine
//! in a `watch` channel plus one cancellation token. Whichever side finishes
//! first moves the state to a final value and cancels the token; the other
//! side observes the cancellation. Cancelling twice is harmless.
//!
//! ```text
//! Running ──begin_promotion──▶ Promoting ──promoted──▶ Promoted
//!    │                            │                       │
//!    └──────── abort ─────────────┴──▶ Aborted            │
//!    └──────── complete ──────────┴───────────────────────┴──▶ Completed
//! ```

use std::sync::Arc;
use std::time::Duration;

use convoy_api::Deployment;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::context::DeployContext;

/// Progress of canary promotion for one watch cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromotionState {
    /// Waiting for the promotion delay.
    Running,
    /// Checking canary health and promoting.
    Promoting,
    /// Canaries were promoted; the watcher keeps going.
    Promoted,
    /// The promoter gave up; the watch cycle fails.
    Aborted,
    /// The watcher finished; the promoter must stop.
    Completed,
}

/// Shared promoter/watcher signalling.
#[derive(Debug, Clone)]
pub struct Handshake {
    state: Arc<watch::Sender<PromotionState>>,
    token: CancellationToken,
}

impl Handshake {
    pub fn new() -> Self {
        let (state, _) = watch::channel(PromotionState::Running);
        Self {
            state: Arc::new(state),
            token: CancellationToken::new(),
        }
    }

    pub fn state(&self) -> PromotionState {
        *self.state.borrow()
    }

    pub fn is_aborted(&self) -> bool {
        self.state() == PromotionState::Aborted
    }

    /// Resolves once either side has finished.
    pub async fn cancelled(&self) {
        self.token.cancelled().await;
    }

    fn transition(&self, allowed: &[PromotionState], next: PromotionState) -> bool {
        self.state.send_if_modified(|state| {
            if allowed.contains(state) {
                *state = next;
                true
            } else {
                false
            }
        })
    }

    /// Start promoting. Fails if the watch cycle already ended.
    pub fn begin_promotion(&self) -> bool {
        self.transition(&[PromotionState::Running], PromotionState::Promoting)
    }

    pub fn promoted(&self) -> bool {
        self.transition(&[PromotionState::Promoting], PromotionState::Promoted)
    }

    /// Promoter side: give up and fail the watch cycle.
    pub fn abort(&self) -> bool {
        let changed = self.transition(
            &[PromotionState::Running, PromotionState::Promoting],
            PromotionState::Aborted,
        );
        self.token.cancel();
        changed
    }

    /// Watcher side: the deployment reached an outcome.
    pub fn complete(&self) -> bool {
        let changed = self.transition(
            &[
                PromotionState::Running,
                PromotionState::Promoting,
                PromotionState::Promoted,
            ],
            PromotionState::Completed,
        );
        self.token.cancel();
        changed
    }
}

impl Default for Handshake {
    fn default() -> Self {
        Self::new()
    }
}

/// Task groups in the canary cohort whose healthy count does not match the
/// desired canary count. Groups without desired canaries are skipped.
pub fn unhealthy_canary_groups(deployment: &Deployment) -> Vec<String> {
    deployment
        .task_groups
        .iter()
        .filter(|(_, state)| state.desired_canaries != 0)
        .filter(|(_, state)| state.desired_canaries != state.healthy_allocs)
        .map(|(group, _)| group.clone())
        .collect()
}

/// Wait `delay`, then promote the deployment if every canary is healthy.
///
/// Promotion is attempted at most once. Any failure aborts the handshake.
pub async fn run_promoter(
    ctx: DeployContext,
    deployment_id: String,
    delay: Duration,
    handshake: Handshake,
) {
    tokio::select! {
        biased;
        _ = handshake.cancelled() => {
            info!(deployment_id = %deployment_id, "canary auto promote has been shutdown");
            return;
        }
        _ = tokio::time::sleep(delay) => {}
    }

    info!(
        deployment_id = %deployment_id,
        delay_secs = delay.as_secs(),
        "auto-promote period {:?} has been reached for deployment {}",
        delay,
        deployment_id
    );

    if !handshake.begin_promotion() {
        debug!(deployment_id = %deployment_id, "deployment already finished; not promoting");
        return;
    }

    let deployment = match ctx.client().deployment_info(&deployment_id, &ctx.query()).await {
        Ok(response) => response.value,
        Err(e) => {
            error!(deployment_id = %deployment_id, error = %e, "unable to query deployment for health");
            handshake.abort();
            return;
        }
    };

    let unhealthy = unhealthy_canary_groups(&deployment);
    if !unhealthy.is_empty() {
        error!(
            deployment_id = %deployment_id,
            groups = ?unhealthy,
            "the canary deployment {} has unhealthy allocations, unable to promote",
            deployment_id
        );
        handshake.abort();
        return;
    }

    info!(deployment_id = %deployment_id, "triggering auto promote of deployment {}", deployment_id);
    if let Err(e) = ctx.client().promote_all(&deployment_id, ctx.write_options()).await {
        error!(deployment_id = %deployment_id, error = %e, "unable to promote deployment");
        handshake.abort();
        return;
    }

    if !handshake.promoted() {
        debug!(deployment_id = %deployment_id, "deployment finished while promoting");
    }
}
