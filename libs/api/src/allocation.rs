//! Allocation resource and task state.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::de::nullable;

pub const TASK_STATE_PENDING: &str = "pending";
pub const TASK_STATE_RUNNING: &str = "running";
pub const TASK_STATE_DEAD: &str = "dead";

/// Summary form returned by list endpoints.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AllocationListStub {
    #[serde(rename = "ID")]
    pub id: String,

    #[serde(rename = "EvalID", default)]
    pub eval_id: String,

    #[serde(rename = "JobID", default)]
    pub job_id: String,

    #[serde(rename = "TaskGroup", default)]
    pub task_group: String,

    #[serde(rename = "ClientStatus", default)]
    pub client_status: String,

    #[serde(rename = "DesiredStatus", default)]
    pub desired_status: String,

    #[serde(rename = "TaskStates", default, deserialize_with = "nullable")]
    pub task_states: BTreeMap<String, TaskState>,
}

/// Full allocation as returned by the allocation info endpoint.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Allocation {
    #[serde(rename = "ID")]
    pub id: String,

    #[serde(rename = "EvalID", default)]
    pub eval_id: String,

    #[serde(rename = "JobID", default)]
    pub job_id: String,

    #[serde(rename = "Namespace", default)]
    pub namespace: String,

    #[serde(rename = "TaskGroup", default)]
    pub task_group: String,

    #[serde(rename = "ClientStatus", default)]
    pub client_status: String,

    #[serde(rename = "TaskStates", default, deserialize_with = "nullable")]
    pub task_states: BTreeMap<String, TaskState>,
}

/// Lifecycle state of one task within an allocation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskState {
    /// `pending`, `running` or `dead`.
    #[serde(rename = "State", default)]
    pub state: String,

    #[serde(rename = "Failed", default)]
    pub failed: bool,

    #[serde(rename = "Events", default, deserialize_with = "nullable")]
    pub events: Vec<TaskEvent>,
}

impl TaskState {
    /// Running, or finished without failing.
    pub fn is_healthy(&self) -> bool {
        match self.state.as_str() {
            TASK_STATE_RUNNING => true,
            TASK_STATE_DEAD => !self.failed,
            _ => false,
        }
    }
}

/// One entry in a task's event history.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskEvent {
    #[serde(rename = "Type", default)]
    pub event_type: String,

    #[serde(rename = "Time", default)]
    pub time: i64,

    #[serde(rename = "DisplayMessage", default)]
    pub display_message: String,

    #[serde(rename = "ValidationError", default)]
    pub validation_error: String,

    #[serde(rename = "SetupError", default)]
    pub setup_error: String,

    #[serde(rename = "DriverError", default)]
    pub driver_error: String,

    #[serde(rename = "DownloadError", default)]
    pub download_error: String,

    #[serde(rename = "KillReason", default)]
    pub kill_reason: String,

    /// Nanoseconds.
    #[serde(rename = "KillTimeout", default)]
    pub kill_timeout: i64,

    #[serde(rename = "KillError", default)]
    pub kill_error: String,

    #[serde(rename = "ExitCode", default)]
    pub exit_code: i64,

    #[serde(rename = "Signal", default)]
    pub signal: i64,

    #[serde(rename = "Message", default)]
    pub message: String,

    #[serde(rename = "RestartReason", default)]
    pub restart_reason: String,

    #[serde(rename = "FailedSibling", default)]
    pub failed_sibling: String,
}

impl TaskEvent {
    pub fn kind(&self) -> TaskEventKind {
        TaskEventKind::from_type(&self.event_type)
    }
}

/// Event types the failure inspector knows how to explain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskEventKind {
    FailedValidation,
    SetupFailure,
    DriverFailure,
    ArtifactDownloadFailed,
    Killing,
    Killed,
    Terminated,
    NotRestarting,
    SiblingFailed,
    LeaderDead,
    Other,
}

impl TaskEventKind {
    pub fn from_type(event_type: &str) -> Self {
        match event_type {
            "Failed Validation" => Self::FailedValidation,
            "Setup Failure" => Self::SetupFailure,
            "Driver Failure" => Self::DriverFailure,
            "Failed Artifact Download" => Self::ArtifactDownloadFailed,
            "Killing" => Self::Killing,
            "Killed" => Self::Killed,
            "Terminated" => Self::Terminated,
            "Not Restarting" => Self::NotRestarting,
            "Sibling Task Failed" => Self::SiblingFailed,
            "Leader Task Dead" => Self::LeaderDead,
            _ => Self::Other,
        }
    }
}
