//! Classification of jobs by how their rollout can be tracked.

use convoy_api::Job;

use crate::error::{DeployError, Result};

pub const JOB_TYPE_SERVICE: &str = "service";
pub const JOB_TYPE_BATCH: &str = "batch";
pub const JOB_TYPE_SYSTEM: &str = "system";

/// How a registered job is followed to a terminal state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobKind {
    /// A service job. With an update policy the scheduler creates a
    /// deployment; without one only job and allocation state is available.
    Service { deployments: bool, canary: bool },
    Batch,
    System,
    /// A type convoy does not track beyond registration.
    Unsupported(String),
}

impl JobKind {
    pub fn classify(job: &Job) -> Result<Self> {
        let kind = match job.job_type.as_deref() {
            None | Some("") => return Err(DeployError::MissingType),
            Some(JOB_TYPE_SERVICE) => Self::Service {
                deployments: job.update.is_some(),
                canary: job.is_canary_enabled(),
            },
            Some(JOB_TYPE_BATCH) => Self::Batch,
            Some(JOB_TYPE_SYSTEM) => Self::System,
            Some(other) => Self::Unsupported(other.to_string()),
        };
        Ok(kind)
    }

    /// True if the rollout is followed through a scheduler deployment.
    pub fn uses_deployments(&self) -> bool {
        matches!(
            self,
            Self::Service {
                deployments: true,
                ..
            }
        )
    }
}

#[cfg(test)]
mod tests {
    use convoy_api::UpdateStrategy;
    use rstest::rstest;

    use super::*;

    fn job(job_type: Option<&str>, update: Option<UpdateStrategy>) -> Job {
        Job {
            id: Some("web".to_string()),
            job_type: job_type.map(str::to_string),
            update,
            ..Job::default()
        }
    }

    #[rstest]
    #[case(Some("batch"), JobKind::Batch)]
    #[case(Some("system"), JobKind::System)]
    #[case(Some("sysbatch"), JobKind::Unsupported("sysbatch".to_string()))]
    #[case(Some("service"), JobKind::Service { deployments: false, canary: false })]
    fn test_classify(#[case] job_type: Option<&str>, #[case] expected: JobKind) {
        assert_eq!(JobKind::classify(&job(job_type, None)).unwrap(), expected);
    }

    #[test]
    fn test_missing_type() {
        assert!(matches!(
            JobKind::classify(&job(None, None)),
            Err(DeployError::MissingType)
        ));
    }

    #[test]
    fn test_service_with_canary_update() {
        let update = UpdateStrategy {
            canary: Some(2),
            ..UpdateStrategy::default()
        };
        let kind = JobKind::classify(&job(Some("service"), Some(update))).unwrap();
        assert_eq!(
            kind,
            JobKind::Service {
                deployments: true,
                canary: true
            }
        );
        assert!(kind.uses_deployments());
    }
}
