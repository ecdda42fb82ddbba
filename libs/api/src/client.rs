//! The scheduler interface the deployment engine is written against.

use std::collections::BTreeMap;

use async_trait::async_trait;

use crate::allocation::{Allocation, AllocationListStub};
use crate::deployment::Deployment;
use crate::evaluation::Evaluation;
use crate::job::{DispatchResponse, Job, RegisterResponse, ValidationResponse};
use crate::plan::JobPlanResponse;
use crate::query::{QueryOptions, Response, WriteOptions};
use crate::Result;

/// Remote scheduler operations.
///
/// Implementations must be safe to call concurrently; the engine shares one
/// instance between the watch loop, the canary promoter and the failure
/// inspector's fan-out.
#[async_trait]
pub trait SchedulerApi: Send + Sync {
    /// Validate a job without registering it.
    async fn validate_job(&self, job: &Job, opts: &WriteOptions) -> Result<ValidationResponse>;

    /// Register (create or update) a job.
    async fn register_job(&self, job: &Job, opts: &WriteOptions) -> Result<RegisterResponse>;

    /// Read the currently registered job.
    async fn job_info(&self, job_id: &str, opts: &QueryOptions) -> Result<Response<Job>>;

    /// Dry-run a job registration and return the diff.
    async fn plan_job(&self, job: &Job, opts: &WriteOptions) -> Result<JobPlanResponse>;

    /// Force a run of a periodic job. Returns the evaluation id.
    async fn periodic_force(&self, job_id: &str, opts: &WriteOptions) -> Result<String>;

    /// Dispatch an instance of a parameterized job.
    async fn dispatch_job(
        &self,
        job_id: &str,
        meta: &BTreeMap<String, String>,
        payload: &[u8],
        opts: &WriteOptions,
    ) -> Result<DispatchResponse>;

    /// The most recent deployment of a job, if it has one.
    async fn latest_deployment(
        &self,
        job_id: &str,
        opts: &QueryOptions,
    ) -> Result<Response<Option<Deployment>>>;

    async fn evaluation_info(&self, eval_id: &str, opts: &QueryOptions)
        -> Result<Response<Evaluation>>;

    async fn evaluation_allocations(
        &self,
        eval_id: &str,
        opts: &QueryOptions,
    ) -> Result<Response<Vec<AllocationListStub>>>;

    async fn deployment_info(
        &self,
        deployment_id: &str,
        opts: &QueryOptions,
    ) -> Result<Response<Deployment>>;

    async fn deployment_allocations(
        &self,
        deployment_id: &str,
        opts: &QueryOptions,
    ) -> Result<Response<Vec<AllocationListStub>>>;

    /// Promote every canary in a deployment.
    async fn promote_all(&self, deployment_id: &str, opts: &WriteOptions) -> Result<()>;

    async fn allocation_info(&self, alloc_id: &str, opts: &QueryOptions)
        -> Result<Response<Allocation>>;
}
