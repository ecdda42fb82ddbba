//! Client settings.
//!
//! Resolved in layers: built-in defaults, then the JSON config file in the
//! platform config directory, then environment variables, then flags.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use convoy_api::http::DEFAULT_ADDRESS;
use convoy_api::{ClientConfig, Job, WriteOptions};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use tracing::info;

/// Configuration file name.
const CONFIG_FILE: &str = "config.json";

fn config_dir() -> Result<PathBuf> {
    ProjectDirs::from("io", "convoy", "convoy")
        .map(|dirs| dirs.config_dir().to_path_buf())
        .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))
}

/// Contents of the config file. Every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,

    /// Namespace for jobs that do not set one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,

    /// Region for jobs that do not set one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,

    #[serde(default)]
    pub allow_stale: bool,
}

impl Config {
    /// Load the config file, or return defaults if there is none.
    pub fn load() -> Result<Self> {
        Self::load_from(&config_dir()?.join(CONFIG_FILE))
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config from {:?}", path))?;

        serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse config from {:?}", path))
    }
}

/// Scope overrides taken from the environment.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EnvOverrides {
    pub namespace: Option<String>,
    pub region: Option<String>,
}

impl EnvOverrides {
    pub fn from_env() -> Self {
        let var = |name: &str| std::env::var(name).ok().filter(|v| !v.is_empty());
        Self {
            namespace: var("NOMAD_NAMESPACE"),
            region: var("NOMAD_REGION"),
        }
    }
}

/// Values given on the command line (or through the environment variables
/// clap reads for them).
#[derive(Debug, Clone, Default)]
pub struct Flags {
    pub address: Option<String>,
    pub token: Option<String>,
    pub allow_stale: bool,
}

/// Fully resolved settings for one invocation.
#[derive(Debug, Clone)]
pub struct Settings {
    pub address: String,
    pub token: Option<String>,
    pub allow_stale: bool,
    default_namespace: Option<String>,
    default_region: Option<String>,
    env: EnvOverrides,
}

impl Settings {
    pub fn resolve(config: Config, env: EnvOverrides, flags: Flags) -> Self {
        Self {
            address: flags
                .address
                .or(config.address)
                .unwrap_or_else(|| DEFAULT_ADDRESS.to_string()),
            token: flags.token.or(config.token),
            allow_stale: flags.allow_stale || config.allow_stale,
            default_namespace: config.namespace,
            default_region: config.region,
            env,
        }
    }

    pub fn client_config(&self) -> ClientConfig {
        ClientConfig {
            address: self.address.clone(),
            token: self.token.clone(),
            ..ClientConfig::default()
        }
    }

    /// Write scope for `job`: the job's own namespace and region, replaced
    /// by `NOMAD_NAMESPACE`/`NOMAD_REGION` when set, falling back to the
    /// config file.
    pub fn write_options(&self, job: Option<&Job>) -> WriteOptions {
        let mut namespace = job.and_then(|job| job.namespace.clone());
        let mut region = job.and_then(|job| job.region.clone());

        if let Some(env_namespace) = &self.env.namespace {
            info!("using namespace from env-var: {}", env_namespace);
            namespace = Some(env_namespace.clone());
        }
        if let Some(env_region) = &self.env.region {
            info!("using region from env-var: {}", env_region);
            region = Some(env_region.clone());
        }

        WriteOptions {
            namespace: namespace.or_else(|| self.default_namespace.clone()),
            region: region.or_else(|| self.default_region.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job(namespace: Option<&str>, region: Option<&str>) -> Job {
        Job {
            namespace: namespace.map(str::to_string),
            region: region.map(str::to_string),
            ..Job::default()
        }
    }

    #[test]
    fn test_flags_override_config() {
        let config = Config {
            address: Some("http://config:4646".to_string()),
            token: Some("config-token".to_string()),
            ..Config::default()
        };
        let flags = Flags {
            address: Some("http://flag:4646".to_string()),
            ..Flags::default()
        };

        let settings = Settings::resolve(config, EnvOverrides::default(), flags);
        assert_eq!(settings.address, "http://flag:4646");
        assert_eq!(settings.token.as_deref(), Some("config-token"));
    }

    #[test]
    fn test_default_address() {
        let settings = Settings::resolve(Config::default(), EnvOverrides::default(), Flags::default());
        assert_eq!(settings.address, DEFAULT_ADDRESS);
        assert!(!settings.allow_stale);
    }

    #[test]
    fn test_env_overrides_job_scope() {
        let env = EnvOverrides {
            namespace: Some("ops".to_string()),
            region: None,
        };
        let settings = Settings::resolve(Config::default(), env, Flags::default());

        let write = settings.write_options(Some(&job(Some("platform"), Some("eu"))));
        assert_eq!(write.namespace.as_deref(), Some("ops"));
        assert_eq!(write.region.as_deref(), Some("eu"));
    }

    #[test]
    fn test_config_scope_is_a_fallback() {
        let config = Config {
            namespace: Some("default-ns".to_string()),
            region: Some("us".to_string()),
            ..Config::default()
        };
        let settings = Settings::resolve(config, EnvOverrides::default(), Flags::default());

        let write = settings.write_options(Some(&job(Some("platform"), None)));
        assert_eq!(write.namespace.as_deref(), Some("platform"));
        assert_eq!(write.region.as_deref(), Some("us"));
    }

    #[test]
    fn test_load_missing_and_present_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        assert_eq!(Config::load_from(&path).unwrap(), Config::default());

        fs::write(&path, r#"{"address": "http://nomad:4646", "allow_stale": true}"#).unwrap();
        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.address.as_deref(), Some("http://nomad:4646"));
        assert!(config.allow_stale);
    }
}
