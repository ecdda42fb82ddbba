//! Dry-run planning: ask the scheduler what a registration would change.

use convoy_api::{DiffType, FieldDiff, Job, JobDiff, ObjectDiff};
use tracing::{debug, error, info, Instrument};

use crate::context::DeployContext;
use crate::error::Result;

/// Result of a plan run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlanOutcome {
    /// Whether a deployment should go ahead.
    pub proceed: bool,
    /// Whether the scheduler reported any change.
    pub changes: bool,
}

/// Plan `job` and log every anticipated change.
///
/// A plan without changes stops the deployment unless `ignore_no_changes`
/// is set.
pub async fn trigger_plan(
    ctx: &DeployContext,
    job: &Job,
    ignore_no_changes: bool,
) -> Result<PlanOutcome> {
    async {
        debug!("triggering scheduler plan");

        let response = ctx
            .client()
            .plan_job(job, ctx.write_options())
            .await
            .map_err(|e| {
                error!(error = %e, "unable to run a job plan");
                e
            })?;

        let diff = response.diff.unwrap_or_default();
        let changes = match diff.diff_type {
            DiffType::Added => {
                info!("job is a new addition to the cluster");
                true
            }
            DiffType::None => {
                info!("no changes detected for job");
                false
            }
            DiffType::Edited => {
                for line in describe_diff(&diff) {
                    info!("{}", line);
                }
                true
            }
            DiffType::Deleted | DiffType::Unknown => true,
        };

        if !response.warnings.is_empty() {
            info!(warnings = %response.warnings, "scheduler returned plan warnings");
        }

        let proceed = if changes {
            true
        } else if ignore_no_changes {
            info!("no changes found in job but ignore-no-changes flag set to true");
            true
        } else {
            info!("no changes found in job");
            false
        };

        Ok(PlanOutcome { proceed, changes })
    }
    .instrument(ctx.span().clone())
    .await
}

/// One line per edited field of every edited task group and task.
pub fn describe_diff(diff: &JobDiff) -> Vec<String> {
    let mut lines = Vec::new();

    for group in diff
        .task_groups
        .iter()
        .filter(|g| g.diff_type == DiffType::Edited)
    {
        for object in &group.objects {
            collect_object(&group.name, "", object, &mut lines);
        }

        for task in group
            .tasks
            .iter()
            .filter(|t| t.diff_type == DiffType::Edited)
        {
            for object in &task.objects {
                collect_object(&group.name, &task.name, object, &mut lines);
            }
        }
    }

    lines
}

fn collect_object(group: &str, task: &str, object: &ObjectDiff, lines: &mut Vec<String>) {
    // Only leaf objects carry field-level detail.
    if object.objects.is_empty() && !object.fields.is_empty() {
        if object.diff_type == DiffType::Edited {
            lines.extend(
                object
                    .fields
                    .iter()
                    .filter(|f| f.diff_type == DiffType::Edited)
                    .map(|f| change_line(group, task, &object.name, f)),
            );
        }
        return;
    }

    for child in &object.objects {
        collect_object(group, task, child, lines);
    }
}

fn change_line(group: &str, task: &str, object: &str, field: &FieldDiff) -> String {
    let mut line = String::new();
    if !group.is_empty() {
        line.push_str(&format!("group {} ", group));
    }
    if !task.is_empty() {
        line.push_str(&format!("and task {} ", task));
    }
    line.push_str(&format!(
        "plan indicates change of {}:{} from {} to {}",
        object, field.name, field.old, field.new
    ));
    line
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use convoy_api::mock::Op;
    use convoy_api::{
        JobPlanResponse, MockReply, MockScheduler, TaskDiff, TaskGroupDiff, WriteOptions,
    };
    use rstest::rstest;

    use super::*;

    fn field(name: &str, old: &str, new: &str, diff_type: DiffType) -> FieldDiff {
        FieldDiff {
            diff_type,
            name: name.to_string(),
            old: old.to_string(),
            new: new.to_string(),
        }
    }

    fn object(name: &str, fields: Vec<FieldDiff>) -> ObjectDiff {
        ObjectDiff {
            diff_type: DiffType::Edited,
            name: name.to_string(),
            fields,
            objects: Vec::new(),
        }
    }

    fn edited_diff() -> JobDiff {
        JobDiff {
            diff_type: DiffType::Edited,
            id: "web".to_string(),
            task_groups: vec![
                TaskGroupDiff {
                    diff_type: DiffType::Edited,
                    name: "app".to_string(),
                    objects: vec![object(
                        "Update",
                        vec![field("MaxParallel", "1", "2", DiffType::Edited)],
                    )],
                    tasks: vec![
                        // A task without objects must not hide later tasks.
                        TaskDiff {
                            diff_type: DiffType::Edited,
                            name: "sidecar".to_string(),
                            ..TaskDiff::default()
                        },
                        TaskDiff {
                            diff_type: DiffType::Edited,
                            name: "server".to_string(),
                            objects: vec![ObjectDiff {
                                diff_type: DiffType::Edited,
                                name: "Config".to_string(),
                                objects: vec![object(
                                    "Config",
                                    vec![
                                        field("image", "web:1", "web:2", DiffType::Edited),
                                        field("port", "", "8080", DiffType::Added),
                                    ],
                                )],
                                ..ObjectDiff::default()
                            }],
                            ..TaskDiff::default()
                        },
                    ],
                    ..TaskGroupDiff::default()
                },
                TaskGroupDiff {
                    diff_type: DiffType::None,
                    name: "untouched".to_string(),
                    objects: vec![object(
                        "Update",
                        vec![field("Stagger", "1s", "2s", DiffType::Edited)],
                    )],
                    ..TaskGroupDiff::default()
                },
            ],
            ..JobDiff::default()
        }
    }

    #[test]
    fn test_describe_edited_diff() {
        assert_eq!(
            describe_diff(&edited_diff()),
            vec![
                "group app plan indicates change of Update:MaxParallel from 1 to 2",
                "group app and task server plan indicates change of Config:image from web:1 to web:2",
            ]
        );
    }

    fn plan_reply(diff_type: DiffType) -> MockReply<JobPlanResponse> {
        MockReply::ok(
            JobPlanResponse {
                diff: Some(JobDiff {
                    diff_type,
                    ..JobDiff::default()
                }),
                ..JobPlanResponse::default()
            },
            0,
        )
    }

    #[rstest]
    #[case(DiffType::Added, false, true, true)]
    #[case(DiffType::Edited, false, true, true)]
    #[case(DiffType::None, false, false, false)]
    #[case(DiffType::None, true, true, false)]
    #[tokio::test]
    async fn test_plan_outcome(
        #[case] diff_type: DiffType,
        #[case] ignore_no_changes: bool,
        #[case] proceed: bool,
        #[case] changes: bool,
    ) {
        let mock = Arc::new(MockScheduler::new());
        mock.script_plan(vec![plan_reply(diff_type)]);
        let ctx = DeployContext::new(mock.clone(), WriteOptions::default());

        let outcome = trigger_plan(&ctx, &Job::default(), ignore_no_changes)
            .await
            .unwrap();
        assert_eq!(outcome, PlanOutcome { proceed, changes });
        assert_eq!(mock.calls(Op::PlanJob), 1);
    }

    #[tokio::test]
    async fn test_plan_error_is_returned() {
        let mock = Arc::new(MockScheduler::new());
        mock.script_plan(vec![MockReply::error(400, "job has no task groups")]);
        let ctx = DeployContext::new(mock, WriteOptions::default());

        assert!(trigger_plan(&ctx, &Job::default(), false).await.is_err());
    }
}
