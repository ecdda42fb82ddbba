//! Plan command.

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use convoy_deploy::trigger_plan;

use crate::error::CliError;
use crate::jobfile;

use super::CommandContext;

/// Log what registering a job would change, without registering it.
#[derive(Debug, Args)]
pub struct PlanCommand {
    /// Rendered job file (JSON). Defaults to the single *.nomad.json file
    /// in the working directory.
    job_file: Option<PathBuf>,

    /// Succeed even when the plan shows no changes.
    #[arg(long)]
    ignore_no_changes: bool,
}

impl PlanCommand {
    pub async fn run(self, ctx: CommandContext) -> Result<()> {
        let (_, job) = jobfile::load(self.job_file.as_deref())?;
        let deploy_ctx = ctx.deploy_context(Some(&job))?;

        let outcome = trigger_plan(&deploy_ctx, &job, self.ignore_no_changes).await?;
        if outcome.proceed {
            Ok(())
        } else {
            let job_id = job.id().unwrap_or_default();
            Err(CliError::Failed(format!("plan of job {}", job_id)).into())
        }
    }
}
