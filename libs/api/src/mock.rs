//! Scripted in-memory scheduler for tests.
//!
//! Each read is answered from a per-resource script of [`MockReply`] values,
//! consumed in order. Once a script runs out the last reply is repeated; a
//! repeated reply to a blocking query first sleeps the query's wait time, the
//! way a real blocking query that saw no change would. Reads with no script
//! at all answer `404`.
//!
//! Writes answer from their own scripts, falling back to a default success.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use tracing::debug;

use crate::allocation::{Allocation, AllocationListStub};
use crate::client::SchedulerApi;
use crate::deployment::Deployment;
use crate::error::ApiError;
use crate::evaluation::Evaluation;
use crate::job::{DispatchResponse, Job, RegisterResponse, ValidationResponse};
use crate::plan::JobPlanResponse;
use crate::query::{QueryOptions, Response, WriteOptions};
use crate::Result;

/// One scripted answer.
#[derive(Debug, Clone)]
pub enum MockReply<T> {
    Ok { value: T, index: u64 },
    NotFound,
    Error { status: u16, message: String },
}

impl<T> MockReply<T> {
    pub fn ok(value: T, index: u64) -> Self {
        Self::Ok { value, index }
    }

    pub fn error(status: u16, message: impl Into<String>) -> Self {
        Self::Error {
            status,
            message: message.into(),
        }
    }

    fn into_response(self, what: &str) -> Result<Response<T>> {
        match self {
            Self::Ok { value, index } => Ok(Response::new(value, index)),
            Self::NotFound => Err(ApiError::NotFound(what.to_string())),
            Self::Error { status, message } => Err(ApiError::api(status, message)),
        }
    }
}

/// Scheduler operations, for call counting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    ValidateJob,
    RegisterJob,
    JobInfo,
    PlanJob,
    PeriodicForce,
    DispatchJob,
    LatestDeployment,
    EvaluationInfo,
    EvaluationAllocations,
    DeploymentInfo,
    DeploymentAllocations,
    PromoteAll,
    AllocationInfo,
}

const OP_COUNT: usize = 13;

struct Script<T> {
    pending: VecDeque<MockReply<T>>,
    last: Option<MockReply<T>>,
}

impl<T> Default for Script<T> {
    fn default() -> Self {
        Self {
            pending: VecDeque::new(),
            last: None,
        }
    }
}

impl<T: Clone> Script<T> {
    /// Next reply, and whether it is a repeat of an exhausted script.
    fn next(&mut self) -> Option<(MockReply<T>, bool)> {
        match self.pending.pop_front() {
            Some(reply) => {
                self.last = Some(reply.clone());
                Some((reply, false))
            }
            None => self.last.clone().map(|reply| (reply, true)),
        }
    }
}

type Scripts<T> = HashMap<String, Script<T>>;

#[derive(Default)]
struct State {
    jobs: Scripts<Job>,
    latest_deployments: Scripts<Option<Deployment>>,
    evaluations: Scripts<Evaluation>,
    evaluation_allocations: Scripts<Vec<AllocationListStub>>,
    deployments: Scripts<Deployment>,
    deployment_allocations: Scripts<Vec<AllocationListStub>>,
    allocations: Scripts<Allocation>,

    validations: Script<ValidationResponse>,
    registrations: Script<RegisterResponse>,
    plans: Script<JobPlanResponse>,
    periodic_forces: Script<String>,
    dispatches: Script<DispatchResponse>,
    promotions: Script<()>,

    registered: Vec<Job>,
    promoted: Vec<String>,
    dispatched: Vec<(String, BTreeMap<String, String>, Vec<u8>)>,
    reads: Vec<(Op, String, QueryOptions)>,
}

/// In-memory [`SchedulerApi`] driven by scripted replies.
pub struct MockScheduler {
    state: Mutex<State>,
    calls: [AtomicU64; OP_COUNT],
}

impl MockScheduler {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State::default()),
            calls: Default::default(),
        }
    }

    fn state(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn count(&self, op: Op) {
        self.calls[op as usize].fetch_add(1, Ordering::SeqCst);
    }

    /// Number of times `op` was called.
    pub fn calls(&self, op: Op) -> u64 {
        self.calls[op as usize].load(Ordering::SeqCst)
    }

    // -------------------------------------------------------------------------
    // Scripting
    // -------------------------------------------------------------------------

    pub fn script_job(&self, job_id: &str, replies: Vec<MockReply<Job>>) -> &Self {
        push(&mut self.state().jobs, job_id, replies);
        self
    }

    pub fn script_latest_deployment(
        &self,
        job_id: &str,
        replies: Vec<MockReply<Option<Deployment>>>,
    ) -> &Self {
        push(&mut self.state().latest_deployments, job_id, replies);
        self
    }

    pub fn script_evaluation(&self, eval_id: &str, replies: Vec<MockReply<Evaluation>>) -> &Self {
        push(&mut self.state().evaluations, eval_id, replies);
        self
    }

    pub fn script_evaluation_allocations(
        &self,
        eval_id: &str,
        replies: Vec<MockReply<Vec<AllocationListStub>>>,
    ) -> &Self {
        push(&mut self.state().evaluation_allocations, eval_id, replies);
        self
    }

    pub fn script_deployment(
        &self,
        deployment_id: &str,
        replies: Vec<MockReply<Deployment>>,
    ) -> &Self {
        push(&mut self.state().deployments, deployment_id, replies);
        self
    }

    pub fn script_deployment_allocations(
        &self,
        deployment_id: &str,
        replies: Vec<MockReply<Vec<AllocationListStub>>>,
    ) -> &Self {
        push(&mut self.state().deployment_allocations, deployment_id, replies);
        self
    }

    pub fn script_allocation(&self, alloc_id: &str, replies: Vec<MockReply<Allocation>>) -> &Self {
        push(&mut self.state().allocations, alloc_id, replies);
        self
    }

    pub fn script_validation(&self, replies: Vec<MockReply<ValidationResponse>>) -> &Self {
        self.state().validations.pending.extend(replies);
        self
    }

    pub fn script_register(&self, replies: Vec<MockReply<RegisterResponse>>) -> &Self {
        self.state().registrations.pending.extend(replies);
        self
    }

    pub fn script_plan(&self, replies: Vec<MockReply<JobPlanResponse>>) -> &Self {
        self.state().plans.pending.extend(replies);
        self
    }

    pub fn script_periodic_force(&self, replies: Vec<MockReply<String>>) -> &Self {
        self.state().periodic_forces.pending.extend(replies);
        self
    }

    pub fn script_dispatch(&self, replies: Vec<MockReply<DispatchResponse>>) -> &Self {
        self.state().dispatches.pending.extend(replies);
        self
    }

    pub fn script_promote(&self, replies: Vec<MockReply<()>>) -> &Self {
        self.state().promotions.pending.extend(replies);
        self
    }

    // -------------------------------------------------------------------------
    // Recorded calls
    // -------------------------------------------------------------------------

    /// Jobs passed to `register_job`, in order.
    pub fn registered_jobs(&self) -> Vec<Job> {
        self.state().registered.clone()
    }

    /// Deployment ids passed to `promote_all`, in order.
    pub fn promoted(&self) -> Vec<String> {
        self.state().promoted.clone()
    }

    /// Dispatch requests as `(job_id, meta, payload)`.
    pub fn dispatched(&self) -> Vec<(String, BTreeMap<String, String>, Vec<u8>)> {
        self.state().dispatched.clone()
    }

    /// Wait indexes of every read of `op` against `key`, in order.
    pub fn wait_indexes(&self, op: Op, key: &str) -> Vec<u64> {
        self.state()
            .reads
            .iter()
            .filter(|(read_op, read_key, _)| *read_op == op && read_key == key)
            .map(|(_, _, opts)| opts.wait_index)
            .collect()
    }

    // -------------------------------------------------------------------------
    // Reply plumbing
    // -------------------------------------------------------------------------

    async fn read<T: Clone>(
        &self,
        op: Op,
        key: &str,
        opts: &QueryOptions,
        select: impl FnOnce(&mut State) -> &mut Scripts<T>,
    ) -> Result<Response<T>> {
        self.count(op);
        let next = {
            let mut state = self.state();
            state.reads.push((op, key.to_string(), opts.clone()));
            select(&mut *state).get_mut(key).and_then(Script::next)
        };

        let Some((reply, repeated)) = next else {
            debug!(?op, key, "[MOCK] no script");
            return Err(ApiError::NotFound(format!("{:?} {}", op, key)));
        };

        if repeated && opts.is_blocking() {
            if let Some(wait) = opts.wait_time {
                tokio::time::sleep(wait).await;
            }
        }

        reply.into_response(key)
    }

    fn write<T: Clone + Default>(
        &self,
        op: Op,
        select: impl FnOnce(&mut State) -> &mut Script<T>,
    ) -> Result<T> {
        self.count(op);
        let next = select(&mut *self.state()).next();
        match next {
            Some((reply, _)) => reply.into_response("write").map(|r| r.value),
            None => Ok(T::default()),
        }
    }
}

impl Default for MockScheduler {
    fn default() -> Self {
        Self::new()
    }
}

fn push<T>(scripts: &mut Scripts<T>, key: &str, replies: Vec<MockReply<T>>) {
    scripts
        .entry(key.to_string())
        .or_default()
        .pending
        .extend(replies);
}

#[async_trait]
impl SchedulerApi for MockScheduler {
    async fn validate_job(&self, _job: &Job, _opts: &WriteOptions) -> Result<ValidationResponse> {
        self.write(Op::ValidateJob, |s| &mut s.validations)
    }

    async fn register_job(&self, job: &Job, _opts: &WriteOptions) -> Result<RegisterResponse> {
        self.state().registered.push(job.clone());
        self.write(Op::RegisterJob, |s| &mut s.registrations)
    }

    async fn job_info(&self, job_id: &str, opts: &QueryOptions) -> Result<Response<Job>> {
        self.read(Op::JobInfo, job_id, opts, |s| &mut s.jobs).await
    }

    async fn plan_job(&self, _job: &Job, _opts: &WriteOptions) -> Result<JobPlanResponse> {
        self.write(Op::PlanJob, |s| &mut s.plans)
    }

    async fn periodic_force(&self, _job_id: &str, _opts: &WriteOptions) -> Result<String> {
        self.write(Op::PeriodicForce, |s| &mut s.periodic_forces)
    }

    async fn dispatch_job(
        &self,
        job_id: &str,
        meta: &BTreeMap<String, String>,
        payload: &[u8],
        _opts: &WriteOptions,
    ) -> Result<DispatchResponse> {
        self.state()
            .dispatched
            .push((job_id.to_string(), meta.clone(), payload.to_vec()));
        self.write(Op::DispatchJob, |s| &mut s.dispatches)
    }

    async fn latest_deployment(
        &self,
        job_id: &str,
        opts: &QueryOptions,
    ) -> Result<Response<Option<Deployment>>> {
        self.read(Op::LatestDeployment, job_id, opts, |s| {
            &mut s.latest_deployments
        })
        .await
    }

    async fn evaluation_info(
        &self,
        eval_id: &str,
        opts: &QueryOptions,
    ) -> Result<Response<Evaluation>> {
        self.read(Op::EvaluationInfo, eval_id, opts, |s| &mut s.evaluations)
            .await
    }

    async fn evaluation_allocations(
        &self,
        eval_id: &str,
        opts: &QueryOptions,
    ) -> Result<Response<Vec<AllocationListStub>>> {
        self.read(Op::EvaluationAllocations, eval_id, opts, |s| {
            &mut s.evaluation_allocations
        })
        .await
    }

    async fn deployment_info(
        &self,
        deployment_id: &str,
        opts: &QueryOptions,
    ) -> Result<Response<Deployment>> {
        self.read(Op::DeploymentInfo, deployment_id, opts, |s| {
            &mut s.deployments
        })
        .await
    }

    async fn deployment_allocations(
        &self,
        deployment_id: &str,
        opts: &QueryOptions,
    ) -> Result<Response<Vec<AllocationListStub>>> {
        self.read(Op::DeploymentAllocations, deployment_id, opts, |s| {
            &mut s.deployment_allocations
        })
        .await
    }

    async fn promote_all(&self, deployment_id: &str, _opts: &WriteOptions) -> Result<()> {
        self.state().promoted.push(deployment_id.to_string());
        self.write(Op::PromoteAll, |s| &mut s.promotions)
    }

    async fn allocation_info(
        &self,
        alloc_id: &str,
        opts: &QueryOptions,
    ) -> Result<Response<Allocation>> {
        self.read(Op::AllocationInfo, alloc_id, opts, |s| &mut s.allocations)
            .await
    }
}
