//! Deployment engine for convoy.
//!
//! Registers a job with the scheduler and follows the resulting rollout to
//! a terminal state. Key pieces:
//!
//! - **Controller**: [`trigger_deployment`] validates, reconciles group
//!   counts, registers and then picks a tracker by [`JobKind`].
//! - **Deployment watcher**: long-polls a deployment, optionally alongside a
//!   canary auto-promoter, and follows scheduler auto-reverts on failure.
//! - **Status checker**: for jobs without deployments, waits for the job and
//!   then every placed task to settle.
//! - **Failure inspector**: explains failed allocations through the log.
//! - **Plan, dispatch and monitor** flows built from the same parts.
//!
//! All components take a [`DeployContext`], which carries the client, the
//! request options and the span every log line is recorded in.
//!
//! # Invariants
//!
//! - A poll response is acted on only if its index is strictly greater than
//!   the last accepted index.
//! - Task groups without desired canaries never block promotion.
//! - A job whose groups all have a count of zero is never registered.
//! - Canary promotion is attempted at most once per watch cycle.

pub mod canary;
pub mod context;
pub mod controller;
pub mod dispatch;
pub mod error;
pub mod evaluation;
pub mod index;
pub mod inspector;
pub mod kind;
pub mod monitor;
pub mod plan;
pub mod retry;
pub mod revert;
pub mod status;
pub mod watcher;

pub use canary::{Handshake, PromotionState};
pub use context::{DeployContext, Tuning};
pub use controller::{trigger_deployment, DeployOptions};
pub use dispatch::trigger_dispatch;
pub use error::{DeployError, Result};
pub use evaluation::inspect_evaluation;
pub use index::IndexGate;
pub use kind::JobKind;
pub use monitor::monitor_evaluation;
pub use plan::{trigger_plan, PlanOutcome};
pub use retry::RetryPolicy;
pub use revert::RevertOutcome;
pub use status::check_job_status;
pub use watcher::watch_deployment;
