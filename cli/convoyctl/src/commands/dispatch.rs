//! Dispatch command.

use std::collections::BTreeMap;
use std::io::Read;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use convoy_deploy::trigger_dispatch;

use crate::error::CliError;

use super::CommandContext;

/// Dispatch a parameterized job and follow the dispatched instance.
#[derive(Debug, Args)]
pub struct DispatchCommand {
    /// Meta value in format KEY=VALUE. Can be specified multiple times.
    #[arg(long = "meta", value_name = "KEY=VALUE")]
    meta: Vec<String>,

    /// Parameterized job to dispatch.
    job: String,

    /// Payload file, or `-` to read it from stdin.
    payload: Option<PathBuf>,
}

impl DispatchCommand {
    pub async fn run(self, ctx: CommandContext) -> Result<()> {
        let meta = parse_meta(&self.meta)?;
        let payload = read_payload(self.payload.as_deref())?;
        let deploy_ctx = ctx.deploy_context(None)?;

        if trigger_dispatch(&deploy_ctx, &self.job, &meta, &payload).await {
            Ok(())
        } else {
            Err(CliError::Failed(format!("dispatch of job {}", self.job)).into())
        }
    }
}

fn parse_meta(pairs: &[String]) -> Result<BTreeMap<String, String>, CliError> {
    pairs
        .iter()
        .map(|pair| match pair.split_once('=') {
            Some((key, value)) if !key.trim().is_empty() => {
                Ok((key.trim().to_string(), value.to_string()))
            }
            _ => Err(CliError::InvalidMeta(pair.clone())),
        })
        .collect()
}

fn read_payload(source: Option<&std::path::Path>) -> Result<Vec<u8>> {
    match source {
        None => Ok(Vec::new()),
        Some(path) if path.as_os_str() == "-" => {
            let mut payload = Vec::new();
            std::io::stdin()
                .read_to_end(&mut payload)
                .context("Failed to read payload from stdin")?;
            Ok(payload)
        }
        Some(path) => {
            std::fs::read(path).with_context(|| format!("Failed to read payload from {:?}", path))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_meta() {
        let meta = parse_meta(&["owner=ops".to_string(), "query=a=b".to_string()]).unwrap();
        assert_eq!(meta.get("owner").map(String::as_str), Some("ops"));
        assert_eq!(meta.get("query").map(String::as_str), Some("a=b"));
    }

    #[test]
    fn test_parse_meta_rejects_missing_separator() {
        assert!(matches!(
            parse_meta(&["owner".to_string()]),
            Err(CliError::InvalidMeta(pair)) if pair == "owner"
        ));
        assert!(parse_meta(&["=ops".to_string()]).is_err());
    }

    #[test]
    fn test_read_payload_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("payload.bin");
        std::fs::write(&path, b"input").unwrap();

        assert_eq!(read_payload(Some(&path)).unwrap(), b"input");
        assert!(read_payload(None).unwrap().is_empty());
    }
}
