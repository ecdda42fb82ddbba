//! CLI commands.

mod deploy;
mod dispatch;
mod monitor;
mod plan;

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use convoy_api::{HttpClient, Job, SchedulerApi};
use convoy_deploy::DeployContext;

use crate::config::{Config, EnvOverrides, Flags, Settings};
use crate::logging::{self, LogFormat};

/// convoy - deploy jobs to a Nomad cluster and follow them to completion.
#[derive(Debug, Parser)]
#[command(name = "convoy")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Scheduler HTTP address.
    #[arg(long, global = true, env = "NOMAD_ADDR")]
    address: Option<String>,

    /// ACL token sent with every request.
    #[arg(long, global = true, env = "NOMAD_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// Allow reads to be served by any server, not only the leader.
    #[arg(long, global = true)]
    allow_stale: bool,

    /// Log level or filter directives.
    #[arg(long, global = true, env = "CONVOY_LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Log output format.
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Human)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Register a job and follow its rollout.
    Deploy(deploy::DeployCommand),

    /// Show what registering a job would change.
    Plan(plan::PlanCommand),

    /// Dispatch an instance of a parameterized job.
    Dispatch(dispatch::DispatchCommand),

    /// Follow an evaluation's job to its final state.
    Monitor(monitor::MonitorCommand),

    /// Show CLI version.
    Version,
}

impl Cli {
    /// Run the CLI command.
    pub async fn run(self) -> Result<()> {
        if let Commands::Version = self.command {
            println!("convoy {}", env!("CARGO_PKG_VERSION"));
            return Ok(());
        }

        logging::init(&self.log_level, self.log_format)?;

        let settings = Settings::resolve(
            Config::load()?,
            EnvOverrides::from_env(),
            Flags {
                address: self.address,
                token: self.token,
                allow_stale: self.allow_stale,
            },
        );
        let ctx = CommandContext { settings };

        match self.command {
            Commands::Deploy(cmd) => cmd.run(ctx).await,
            Commands::Plan(cmd) => cmd.run(ctx).await,
            Commands::Dispatch(cmd) => cmd.run(ctx).await,
            Commands::Monitor(cmd) => cmd.run(ctx).await,
            Commands::Version => Ok(()),
        }
    }
}

/// Shared command context.
pub struct CommandContext {
    pub settings: Settings,
}

impl CommandContext {
    /// Build a scheduler client from the resolved settings.
    pub fn client(&self) -> Result<Arc<dyn SchedulerApi>> {
        let client = HttpClient::new(&self.settings.client_config())
            .with_context(|| format!("Failed to create client for {}", self.settings.address))?;
        Ok(Arc::new(client))
    }

    /// Engine context scoped to `job`'s namespace and region.
    pub fn deploy_context(&self, job: Option<&Job>) -> Result<DeployContext> {
        Ok(DeployContext::new(self.client()?, self.settings.write_options(job))
            .with_allow_stale(self.settings.allow_stale))
    }
}
