//! Deploy command.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use clap::Args;
use convoy_deploy::{trigger_deployment, trigger_plan, DeployOptions};
use tracing::info;

use crate::error::CliError;
use crate::jobfile;

use super::CommandContext;

/// Register a job and follow it until it is healthy or has failed.
#[derive(Debug, Args)]
pub struct DeployCommand {
    /// Rendered job file (JSON). Defaults to the single *.nomad.json file
    /// in the working directory.
    job_file: Option<PathBuf>,

    /// Promote canaries once they have been healthy for this many seconds.
    /// Zero disables auto-promotion.
    #[arg(long, value_name = "SECONDS", default_value_t = 0)]
    canary_auto_promote: u64,

    /// Skip the plan and deploy unconditionally.
    #[arg(long)]
    force: bool,

    /// Run a periodic job immediately after registering it.
    #[arg(long)]
    force_batch: bool,

    /// Keep the job file's group counts instead of the running job's.
    #[arg(long)]
    force_count: bool,

    /// Succeed without deploying when the plan shows no changes.
    #[arg(long)]
    ignore_no_changes: bool,

    /// Vault token to attach to the job.
    #[arg(long, conflicts_with = "vault")]
    vault_token: Option<String>,

    /// Attach the Vault token from VAULT_TOKEN.
    #[arg(long)]
    vault: bool,
}

impl DeployCommand {
    pub async fn run(self, ctx: CommandContext) -> Result<()> {
        let (_, mut job) = jobfile::load(self.job_file.as_deref())?;
        let job_id = job.id().unwrap_or_default().to_string();
        let deploy_ctx = ctx.deploy_context(Some(&job))?;

        if !self.force {
            let outcome = trigger_plan(&deploy_ctx, &job, self.ignore_no_changes).await?;
            if !outcome.proceed {
                return Err(CliError::Failed(format!("plan of job {}", job_id)).into());
            }
            if !outcome.changes {
                info!("no changes to deploy for job {}", job_id);
                return Ok(());
            }
        }

        let options = DeployOptions {
            canary_auto_promote: Duration::from_secs(self.canary_auto_promote),
            force_batch: self.force_batch,
            force_count: self.force_count,
            vault_token: self.vault_token()?,
        };

        if trigger_deployment(&deploy_ctx, &mut job, &options).await {
            Ok(())
        } else {
            Err(CliError::Failed(format!("deployment of job {}", job_id)).into())
        }
    }

    fn vault_token(&self) -> Result<Option<String>> {
        if !self.vault {
            return Ok(self.vault_token.clone());
        }

        match std::env::var("VAULT_TOKEN") {
            Ok(token) if !token.is_empty() => Ok(Some(token)),
            _ => Err(anyhow::anyhow!("--vault was given but VAULT_TOKEN is not set")),
        }
    }
}
