//! Deployment resource.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::de::nullable;

pub const DEPLOYMENT_STATUS_RUNNING: &str = "running";
pub const DEPLOYMENT_STATUS_SUCCESSFUL: &str = "successful";
pub const DEPLOYMENT_STATUS_FAILED: &str = "failed";
pub const DEPLOYMENT_STATUS_CANCELLED: &str = "cancelled";

/// The scheduler's tracked rollout of a job version.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Deployment {
    #[serde(rename = "ID")]
    pub id: String,

    #[serde(rename = "JobID", default)]
    pub job_id: String,

    #[serde(rename = "Namespace", default)]
    pub namespace: String,

    #[serde(rename = "JobVersion", default)]
    pub job_version: u64,

    #[serde(rename = "Status", default)]
    pub status: String,

    #[serde(rename = "StatusDescription", default)]
    pub status_description: String,

    #[serde(rename = "TaskGroups", default, deserialize_with = "nullable")]
    pub task_groups: BTreeMap<String, DeploymentState>,
}

impl Deployment {
    /// True if any task group in the deployment has auto-revert enabled.
    pub fn has_auto_revert(&self) -> bool {
        self.task_groups.values().any(|state| state.auto_revert)
    }
}

/// Per task group rollout progress.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeploymentState {
    #[serde(rename = "AutoRevert", default)]
    pub auto_revert: bool,

    #[serde(rename = "AutoPromote", default)]
    pub auto_promote: bool,

    #[serde(rename = "Promoted", default)]
    pub promoted: bool,

    #[serde(rename = "DesiredCanaries", default)]
    pub desired_canaries: i64,

    #[serde(rename = "DesiredTotal", default)]
    pub desired_total: i64,

    #[serde(rename = "PlacedAllocs", default)]
    pub placed_allocs: i64,

    #[serde(rename = "HealthyAllocs", default)]
    pub healthy_allocs: i64,

    #[serde(rename = "UnhealthyAllocs", default)]
    pub unhealthy_allocs: i64,

    #[serde(rename = "PlacedCanaries", default, deserialize_with = "nullable")]
    pub placed_canaries: Vec<String>,
}
