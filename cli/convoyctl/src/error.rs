//! Error handling and display for the CLI.

use std::path::PathBuf;

use colored::Colorize;
use convoy_api::ApiError;
use convoy_deploy::DeployError;
use thiserror::Error;

/// CLI-specific errors.
#[derive(Debug, Error)]
pub enum CliError {
    /// The engine reported failure; the cause is in the log output.
    #[error("{0} failed")]
    Failed(String),

    #[error("Failed to parse job file {path:?}: {message}")]
    JobFile { path: PathBuf, message: String },

    #[error("No job file given and {0}")]
    NoJobFile(String),

    #[error("Invalid meta {0:?}; expected key=value")]
    InvalidMeta(String),
}

/// Print an error in a user-friendly format.
pub fn print_error(err: &anyhow::Error) {
    eprintln!("{} {:#}", "Error:".red().bold(), err);

    if let Some(hint) = hint(err) {
        eprintln!("\n{}", hint.yellow());
    }
}

fn hint(err: &anyhow::Error) -> Option<&'static str> {
    if let Some(cli_err) = err.downcast_ref::<CliError>() {
        return match cli_err {
            CliError::Failed(_) => Some("Hint: The log output above explains what went wrong."),
            CliError::NoJobFile(_) => {
                Some("Hint: Pass the rendered job file, e.g. `convoy deploy web.nomad.json`.")
            }
            _ => None,
        };
    }

    let api_err = err.downcast_ref::<ApiError>().or_else(|| match err.downcast_ref::<DeployError>() {
        Some(DeployError::Api(api_err)) => Some(api_err),
        _ => None,
    })?;

    match api_err {
        ApiError::Network(_) => Some("Hint: Check that NOMAD_ADDR or --address points at a reachable server."),
        ApiError::Api { status: 401 | 403, .. } => {
            Some("Hint: Check the ACL token given with NOMAD_TOKEN or --token.")
        }
        ApiError::NotFound(_) => Some("Hint: Check the namespace and region the request was scoped to."),
        _ => None,
    }
}
