//! Errors raised by the deployment engine.

use std::time::Duration;

use convoy_api::ApiError;
use thiserror::Error;

/// Deployment engine errors.
///
/// Every fatal path logs before returning one of these; the controller
/// reduces them to a boolean outcome.
#[derive(Debug, Error)]
pub enum DeployError {
    /// The scheduler rejected the job.
    #[error("job validation failed: {0}")]
    Validation(String),

    /// The job does not declare a type.
    #[error("job `type` is not set; should be set to `service`, `batch` or `system`")]
    MissingType,

    /// The job has neither an ID nor a name.
    #[error("job has no ID or name")]
    MissingName,

    /// A task group asks for fewer than zero instances.
    #[error("task group {group} has negative count {count}")]
    NegativeCount { group: String, count: i64 },

    /// Canary auto-promote was requested for a job without canaries.
    #[error("canary auto-promote requires a job with an update canary count above zero")]
    CanaryNotEnabled,

    /// Force-batch was requested for a job that is not periodic.
    #[error("force-batch requires a periodic job")]
    NotPeriodic,

    /// A write that must create an evaluation did not.
    #[error("{0} did not return an evaluation")]
    NoEvaluation(String),

    /// A bounded wait ran out.
    #[error("timed out after {after:?} waiting for {what}")]
    Timeout { what: String, after: Duration },

    /// One or more tasks failed.
    #[error("{0} task(s) failed")]
    TasksFailed(usize),

    #[error(transparent)]
    Api(#[from] ApiError),
}

impl DeployError {
    pub fn timeout(what: impl Into<String>, after: Duration) -> Self {
        Self::Timeout {
            what: what.into(),
            after,
        }
    }
}

/// Result alias for engine operations.
pub type Result<T> = std::result::Result<T, DeployError>;
