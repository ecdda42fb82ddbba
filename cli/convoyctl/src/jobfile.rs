//! Loading rendered job files.
//!
//! A job file is the JSON form of a job, either bare or wrapped in a
//! `{"Job": ...}` envelope as the scheduler's own tooling writes it.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use convoy_api::Job;
use serde::Deserialize;

use crate::error::CliError;

/// Suffix of job files picked up from the working directory.
const JOB_FILE_SUFFIX: &str = ".nomad.json";

#[derive(Deserialize)]
#[serde(untagged)]
enum JobDocument {
    Wrapped {
        #[serde(rename = "Job")]
        job: Job,
    },
    Bare(Job),
}

pub fn parse_job(contents: &str) -> std::result::Result<Job, serde_json::Error> {
    // Untagged errors say nothing useful, so report the bare-job error.
    match serde_json::from_str::<JobDocument>(contents) {
        Ok(JobDocument::Wrapped { job }) | Ok(JobDocument::Bare(job)) => Ok(job),
        Err(_) => serde_json::from_str::<Job>(contents),
    }
}

/// Load `path`, or the single job file in the working directory when no
/// path is given.
pub fn load(path: Option<&Path>) -> Result<(PathBuf, Job)> {
    let path = match path {
        Some(path) => path.to_path_buf(),
        None => find_job_file(Path::new("."))?,
    };

    let contents = fs::read_to_string(&path)
        .with_context(|| format!("Failed to read job file {:?}", path))?;
    let job = parse_job(&contents).map_err(|e| CliError::JobFile {
        path: path.clone(),
        message: e.to_string(),
    })?;

    Ok((path, job))
}

fn find_job_file(dir: &Path) -> Result<PathBuf> {
    let mut candidates = Vec::new();
    for entry in fs::read_dir(dir).with_context(|| format!("Failed to list {:?}", dir))? {
        let path = entry?.path();
        let is_job_file = path
            .file_name()
            .and_then(|name| name.to_str())
            .is_some_and(|name| name.ends_with(JOB_FILE_SUFFIX));
        if is_job_file && path.is_file() {
            candidates.push(path);
        }
    }

    match candidates.len() {
        1 => Ok(candidates.remove(0)),
        0 => Err(CliError::NoJobFile(format!("no *{} file found", JOB_FILE_SUFFIX)).into()),
        n => Err(CliError::NoJobFile(format!("{} *{} files found", n, JOB_FILE_SUFFIX)).into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_wrapped_and_bare() {
        let wrapped = parse_job(r#"{"Job": {"ID": "web", "Type": "service"}}"#).unwrap();
        assert_eq!(wrapped.id(), Some("web"));

        let bare = parse_job(r#"{"ID": "web", "Type": "service"}"#).unwrap();
        assert_eq!(bare.id(), Some("web"));
    }

    #[test]
    fn test_parse_error() {
        assert!(parse_job("not json").is_err());
    }

    #[test]
    fn test_find_single_job_file() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("web.nomad.json"), "{}").unwrap();
        fs::write(dir.path().join("notes.txt"), "").unwrap();

        let found = find_job_file(dir.path()).unwrap();
        assert!(found.ends_with("web.nomad.json"));
    }

    #[test]
    fn test_find_rejects_ambiguous_directory() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("web.nomad.json"), "{}").unwrap();
        fs::write(dir.path().join("api.nomad.json"), "{}").unwrap();

        let err = find_job_file(dir.path()).unwrap_err();
        assert!(matches!(err.downcast_ref::<CliError>(), Some(CliError::NoJobFile(_))));
    }

    #[test]
    fn test_load_reports_job_file_errors() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.nomad.json");
        fs::write(&path, "{").unwrap();

        let err = load(Some(&path)).unwrap_err();
        assert!(matches!(err.downcast_ref::<CliError>(), Some(CliError::JobFile { .. })));
    }
}
