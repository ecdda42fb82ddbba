//! Scheduler API model and client for convoy.
//!
//! This crate is the boundary between the deployment engine and the remote
//! cluster scheduler. It provides:
//!
//! - **Resource model**: jobs, evaluations, deployments, allocations and
//!   task states in the scheduler's JSON wire format.
//! - **Blocking queries**: [`QueryOptions`] carries the wait index and wait
//!   time; every read returns a [`Response`] with the index the server
//!   reported, so callers can detect whether remote state actually changed.
//! - **[`SchedulerApi`]**: the async trait the engine talks to, shared as
//!   `Arc<dyn SchedulerApi>` across concurrent tasks.
//! - **[`HttpClient`]**: the reqwest implementation of the trait.
//! - **[`MockScheduler`]**: a scripted in-memory implementation for tests.
//!
//! # Invariants
//!
//! - A `404` from the scheduler always surfaces as [`ApiError::NotFound`];
//!   callers never need to inspect error text.
//! - Fields the model does not know about survive a decode/encode cycle of a
//!   [`Job`], so a rendered job is registered exactly as it was supplied.

pub mod allocation;
pub mod client;
pub mod deployment;
pub mod error;
pub mod evaluation;
pub mod http;
pub mod job;
pub mod mock;
pub mod plan;
pub mod query;

mod de;

pub use allocation::{Allocation, AllocationListStub, TaskEvent, TaskEventKind, TaskState};
pub use client::SchedulerApi;
pub use deployment::{Deployment, DeploymentState};
pub use error::ApiError;
pub use evaluation::{AllocationMetric, Evaluation};
pub use http::{ClientConfig, HttpClient};
pub use job::{
    DispatchResponse, Job, ParameterizedJobConfig, PeriodicConfig, RegisterResponse, TaskGroup,
    UpdateStrategy, ValidationResponse,
};
pub use mock::{MockReply, MockScheduler};
pub use plan::{DiffType, FieldDiff, JobDiff, JobPlanResponse, ObjectDiff, TaskDiff, TaskGroupDiff};
pub use query::{QueryMeta, QueryOptions, Response, WriteOptions};

/// Result alias for scheduler calls.
pub type Result<T> = std::result::Result<T, ApiError>;
