//! Per-invocation context threaded through every engine component.

use std::sync::Arc;
use std::time::Duration;

use convoy_api::{QueryOptions, SchedulerApi, WriteOptions};
use tracing::Span;

use crate::retry::RetryPolicy;

/// Poll intervals and bounds used by the engine.
#[derive(Debug, Clone)]
pub struct Tuning {
    /// Server-side wait time of blocking queries.
    pub wait_time: Duration,

    /// Sleep between evaluation polls that saw no change.
    pub eval_poll_interval: Duration,

    /// Sleep between lookups of a fresh evaluation's deployment id.
    pub deployment_id_interval: Duration,

    /// Give up looking for the deployment id after this long.
    pub deployment_id_timeout: Duration,

    /// Lookups of the latest deployment while following an auto-revert.
    pub revert_attempts: u32,

    pub revert_interval: Duration,

    pub retry: RetryPolicy,
}

impl Default for Tuning {
    fn default() -> Self {
        Self {
            wait_time: Duration::from_secs(5),
            eval_poll_interval: Duration::from_secs(1),
            deployment_id_interval: Duration::from_secs(2),
            deployment_id_timeout: Duration::from_secs(60),
            revert_attempts: 5,
            revert_interval: Duration::from_secs(1),
            retry: RetryPolicy::default(),
        }
    }
}

/// Shared client, request options and logging span for one deployment.
///
/// Cloning is cheap; background tasks take their own clone.
#[derive(Clone)]
pub struct DeployContext {
    client: Arc<dyn SchedulerApi>,
    write: WriteOptions,
    allow_stale: bool,
    tuning: Tuning,
    span: Span,
}

impl DeployContext {
    pub fn new(client: Arc<dyn SchedulerApi>, write: WriteOptions) -> Self {
        Self {
            client,
            write,
            allow_stale: false,
            tuning: Tuning::default(),
            span: Span::current(),
        }
    }

    pub fn with_allow_stale(mut self, allow_stale: bool) -> Self {
        self.allow_stale = allow_stale;
        self
    }

    /// Tag all log output of this context with `job_id`.
    pub fn for_job(&self, job_id: &str) -> Self {
        let span = tracing::info_span!(parent: &self.span, "job", job_id = %job_id);
        Self {
            span,
            ..self.clone()
        }
    }

    pub fn client(&self) -> &dyn SchedulerApi {
        self.client.as_ref()
    }

    pub fn write_options(&self) -> &WriteOptions {
        &self.write
    }

    pub fn tuning(&self) -> &Tuning {
        &self.tuning
    }

    pub fn span(&self) -> &Span {
        &self.span
    }

    /// Options for a plain read.
    pub fn query(&self) -> QueryOptions {
        QueryOptions {
            allow_stale: self.allow_stale,
            ..QueryOptions::from(&self.write)
        }
    }

    /// Options for a blocking read from `wait_index`.
    pub fn blocking_query(&self, wait_index: u64) -> QueryOptions {
        self.query().blocking(wait_index, self.tuning.wait_time)
    }
}
