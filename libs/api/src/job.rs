//! Job resource and the responses to job writes.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::de::nullable;

/// A job specification as registered with the scheduler.
///
/// Only the fields convoy acts on are modelled; everything else is carried
/// in `extra` and written back unchanged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Job {
    #[serde(rename = "ID", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    #[serde(rename = "Name", default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(rename = "Namespace", default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,

    #[serde(rename = "Region", default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,

    /// Declared type: `service`, `batch` or `system`.
    #[serde(rename = "Type", default, skip_serializing_if = "Option::is_none")]
    pub job_type: Option<String>,

    /// Server-side status; only present on jobs read back from the scheduler.
    #[serde(rename = "Status", default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,

    #[serde(rename = "Update", default, skip_serializing_if = "Option::is_none")]
    pub update: Option<UpdateStrategy>,

    #[serde(rename = "Periodic", default, skip_serializing_if = "Option::is_none")]
    pub periodic: Option<PeriodicConfig>,

    #[serde(
        rename = "ParameterizedJob",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub parameterized_job: Option<ParameterizedJobConfig>,

    #[serde(
        rename = "Dispatched",
        default,
        skip_serializing_if = "std::ops::Not::not"
    )]
    pub dispatched: bool,

    #[serde(rename = "VaultToken", default, skip_serializing_if = "Option::is_none")]
    pub vault_token: Option<String>,

    #[serde(rename = "TaskGroups", default, deserialize_with = "nullable")]
    pub task_groups: Vec<TaskGroup>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Job {
    /// Identifier used in API paths: the ID, falling back to the name.
    pub fn id(&self) -> Option<&str> {
        self.id.as_deref().or(self.name.as_deref())
    }

    /// Name used for lookups and log fields: the name, falling back to the ID.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref().or(self.id.as_deref())
    }

    pub fn is_periodic(&self) -> bool {
        self.periodic.is_some()
    }

    /// A parameterized job that has not itself been dispatched.
    pub fn is_parameterized(&self) -> bool {
        self.parameterized_job.is_some() && !self.dispatched
    }

    /// True if a canary count above zero is set at job or any group level.
    pub fn is_canary_enabled(&self) -> bool {
        let job_level = self.update.as_ref().is_some_and(UpdateStrategy::has_canaries);
        job_level
            || self
                .task_groups
                .iter()
                .filter_map(|group| group.update.as_ref())
                .any(UpdateStrategy::has_canaries)
    }

    /// True if every task group resolves to a count of zero.
    ///
    /// A group without a count resolves to one, so it is never zero. A job
    /// without groups is not a zero-count job.
    pub fn is_zero_count(&self) -> bool {
        !self.task_groups.is_empty()
            && self
                .task_groups
                .iter()
                .all(|group| group.count == Some(0))
    }

    /// Look up a task group by name.
    pub fn task_group_mut(&mut self, name: &str) -> Option<&mut TaskGroup> {
        self.task_groups
            .iter_mut()
            .find(|group| group.name.as_deref() == Some(name))
    }
}

/// A task group within a job.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskGroup {
    #[serde(rename = "Name", default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(rename = "Count", default, skip_serializing_if = "Option::is_none")]
    pub count: Option<i64>,

    #[serde(rename = "Update", default, skip_serializing_if = "Option::is_none")]
    pub update: Option<UpdateStrategy>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Rolling update policy, at job or group level.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UpdateStrategy {
    #[serde(rename = "Canary", default, skip_serializing_if = "Option::is_none")]
    pub canary: Option<i64>,

    #[serde(rename = "AutoRevert", default, skip_serializing_if = "Option::is_none")]
    pub auto_revert: Option<bool>,

    #[serde(rename = "AutoPromote", default, skip_serializing_if = "Option::is_none")]
    pub auto_promote: Option<bool>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl UpdateStrategy {
    pub fn has_canaries(&self) -> bool {
        self.canary.is_some_and(|canary| canary > 0)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PeriodicConfig {
    #[serde(rename = "Enabled", default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,

    #[serde(rename = "Spec", default, skip_serializing_if = "Option::is_none")]
    pub spec: Option<String>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParameterizedJobConfig {
    #[serde(rename = "Payload", default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<String>,

    #[serde(
        rename = "MetaRequired",
        default,
        deserialize_with = "nullable",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub meta_required: Vec<String>,

    #[serde(
        rename = "MetaOptional",
        default,
        deserialize_with = "nullable",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub meta_optional: Vec<String>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Response to a job registration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RegisterResponse {
    /// Evaluation created by the registration; empty for periodic and
    /// parameterized jobs.
    #[serde(rename = "EvalID", default)]
    pub eval_id: String,

    #[serde(rename = "JobModifyIndex", default)]
    pub job_modify_index: u64,

    #[serde(rename = "Warnings", default, deserialize_with = "nullable")]
    pub warnings: String,
}

/// Response to a job validation.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ValidationResponse {
    #[serde(rename = "DriverConfigValidated", default)]
    pub driver_config_validated: bool,

    #[serde(rename = "ValidationErrors", default, deserialize_with = "nullable")]
    pub validation_errors: Vec<String>,

    #[serde(rename = "Error", default, deserialize_with = "nullable")]
    pub error: String,

    #[serde(rename = "Warnings", default, deserialize_with = "nullable")]
    pub warnings: String,
}

impl ValidationResponse {
    /// All problems the scheduler reported, joined for display.
    pub fn failure(&self) -> Option<String> {
        if !self.validation_errors.is_empty() {
            return Some(self.validation_errors.join("; "));
        }
        if !self.error.is_empty() {
            return Some(self.error.clone());
        }
        None
    }
}

/// Response to a parameterized job dispatch.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DispatchResponse {
    #[serde(rename = "DispatchedJobID", default)]
    pub dispatched_job_id: String,

    #[serde(rename = "EvalID", default)]
    pub eval_id: String,

    #[serde(rename = "EvalCreateIndex", default)]
    pub eval_create_index: u64,
}
