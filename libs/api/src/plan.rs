//! Job plan (dry-run) diff model.

use serde::{Deserialize, Serialize};

use crate::de::nullable;

/// Kind of change a diff entry describes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum DiffType {
    Added,
    Deleted,
    Edited,
    #[default]
    None,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct JobPlanResponse {
    #[serde(rename = "JobModifyIndex", default)]
    pub job_modify_index: u64,

    #[serde(rename = "Diff", default)]
    pub diff: Option<JobDiff>,

    #[serde(rename = "Warnings", default, deserialize_with = "nullable")]
    pub warnings: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct JobDiff {
    #[serde(rename = "Type", default)]
    pub diff_type: DiffType,

    #[serde(rename = "ID", default)]
    pub id: String,

    #[serde(rename = "Fields", default, deserialize_with = "nullable")]
    pub fields: Vec<FieldDiff>,

    #[serde(rename = "Objects", default, deserialize_with = "nullable")]
    pub objects: Vec<ObjectDiff>,

    #[serde(rename = "TaskGroups", default, deserialize_with = "nullable")]
    pub task_groups: Vec<TaskGroupDiff>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TaskGroupDiff {
    #[serde(rename = "Type", default)]
    pub diff_type: DiffType,

    #[serde(rename = "Name", default)]
    pub name: String,

    #[serde(rename = "Fields", default, deserialize_with = "nullable")]
    pub fields: Vec<FieldDiff>,

    #[serde(rename = "Objects", default, deserialize_with = "nullable")]
    pub objects: Vec<ObjectDiff>,

    #[serde(rename = "Tasks", default, deserialize_with = "nullable")]
    pub tasks: Vec<TaskDiff>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TaskDiff {
    #[serde(rename = "Type", default)]
    pub diff_type: DiffType,

    #[serde(rename = "Name", default)]
    pub name: String,

    #[serde(rename = "Fields", default, deserialize_with = "nullable")]
    pub fields: Vec<FieldDiff>,

    #[serde(rename = "Objects", default, deserialize_with = "nullable")]
    pub objects: Vec<ObjectDiff>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ObjectDiff {
    #[serde(rename = "Type", default)]
    pub diff_type: DiffType,

    #[serde(rename = "Name", default)]
    pub name: String,

    #[serde(rename = "Fields", default, deserialize_with = "nullable")]
    pub fields: Vec<FieldDiff>,

    #[serde(rename = "Objects", default, deserialize_with = "nullable")]
    pub objects: Vec<ObjectDiff>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct FieldDiff {
    #[serde(rename = "Type", default)]
    pub diff_type: DiffType,

    #[serde(rename = "Name", default)]
    pub name: String,

    #[serde(rename = "Old", default)]
    pub old: String,

    #[serde(rename = "New", default)]
    pub new: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_plan_diff() {
        let json = r#"{
            "JobModifyIndex": 12,
            "Diff": {
                "Type": "Edited",
                "ID": "web",
                "Fields": null,
                "TaskGroups": [{
                    "Type": "Edited",
                    "Name": "app",
                    "Tasks": [{
                        "Type": "Edited",
                        "Name": "server",
                        "Objects": [{
                            "Type": "Edited",
                            "Name": "Config",
                            "Fields": [{"Type": "Edited", "Name": "image", "Old": "web:1", "New": "web:2"}]
                        }]
                    }]
                }]
            }
        }"#;

        let plan: JobPlanResponse = serde_json::from_str(json).unwrap();
        let diff = plan.diff.unwrap();
        assert_eq!(diff.diff_type, DiffType::Edited);

        let field = &diff.task_groups[0].tasks[0].objects[0].fields[0];
        assert_eq!(field.name, "image");
        assert_eq!(field.new, "web:2");
    }

    #[test]
    fn test_unrecognised_diff_type() {
        let diff: FieldDiff = serde_json::from_str(r#"{"Type": "Renamed"}"#).unwrap();
        assert_eq!(diff.diff_type, DiffType::Unknown);
    }
}
