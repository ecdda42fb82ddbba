//! Evaluation resource.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::de::nullable;

pub const EVAL_STATUS_PENDING: &str = "pending";
pub const EVAL_STATUS_COMPLETE: &str = "complete";
pub const EVAL_STATUS_FAILED: &str = "failed";
pub const EVAL_STATUS_CANCELED: &str = "canceled";

/// A scheduling attempt produced by a job write.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Evaluation {
    #[serde(rename = "ID")]
    pub id: String,

    #[serde(rename = "JobID", default)]
    pub job_id: String,

    #[serde(rename = "Namespace", default)]
    pub namespace: String,

    #[serde(rename = "Status", default)]
    pub status: String,

    #[serde(rename = "StatusDescription", default)]
    pub status_description: String,

    /// Empty until the scheduler has created the deployment.
    #[serde(rename = "DeploymentID", default)]
    pub deployment_id: String,

    /// Placement failures keyed by task group.
    #[serde(rename = "FailedTGAllocs", default, deserialize_with = "nullable")]
    pub failed_tg_allocs: BTreeMap<String, AllocationMetric>,
}

impl Evaluation {
    /// True once the evaluation is `complete`, `failed` or `canceled`.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self.status.as_str(),
            EVAL_STATUS_COMPLETE | EVAL_STATUS_FAILED | EVAL_STATUS_CANCELED
        )
    }
}

/// Placement metrics for one task group.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AllocationMetric {
    #[serde(rename = "NodesEvaluated", default)]
    pub nodes_evaluated: i64,

    #[serde(rename = "NodesFiltered", default)]
    pub nodes_filtered: i64,

    #[serde(rename = "NodesExhausted", default)]
    pub nodes_exhausted: i64,

    #[serde(rename = "ClassFiltered", default, deserialize_with = "nullable")]
    pub class_filtered: BTreeMap<String, i64>,

    #[serde(rename = "ConstraintFiltered", default, deserialize_with = "nullable")]
    pub constraint_filtered: BTreeMap<String, i64>,

    #[serde(rename = "ClassExhausted", default, deserialize_with = "nullable")]
    pub class_exhausted: BTreeMap<String, i64>,

    #[serde(rename = "DimensionExhausted", default, deserialize_with = "nullable")]
    pub dimension_exhausted: BTreeMap<String, i64>,
}
