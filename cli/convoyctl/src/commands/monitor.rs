//! Monitor command.

use std::time::Duration;

use anyhow::Result;
use clap::Args;
use convoy_deploy::monitor_evaluation;

use super::CommandContext;

/// Follow the job behind an evaluation until it reaches its final state.
#[derive(Debug, Args)]
pub struct MonitorCommand {
    /// Give up after this many seconds. Zero waits indefinitely.
    #[arg(long, value_name = "SECONDS", default_value_t = 0)]
    timeout: u64,

    /// Evaluation to follow.
    eval_id: String,
}

impl MonitorCommand {
    pub async fn run(self, ctx: CommandContext) -> Result<()> {
        let timeout = (self.timeout > 0).then(|| Duration::from_secs(self.timeout));
        let deploy_ctx = ctx.deploy_context(None)?;

        monitor_evaluation(&deploy_ctx, &self.eval_id, timeout).await?;
        Ok(())
    }
}
