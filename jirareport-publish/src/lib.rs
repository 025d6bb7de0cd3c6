use std::{
    ffi::OsString,
    io,
    path::{Path, PathBuf},
    process::{Command, ExitStatus, Output},
};

use chrono::Local;
use jirareport_config::ReportConfig;
use jirareport_domain::TIMESTAMP_FORMAT;
use thiserror::Error;
use tracing::debug;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PublishOutcome {
    NoChanges,
    Pushed { message: String },
}

#[derive(Debug, Error)]
pub enum PublishError {
    #[error("failed to run git {step}: {source}")]
    Spawn {
        step: &'static str,
        #[source]
        source: io::Error,
    },
    #[error("git {step} exited with {status}: {stderr}")]
    Failed {
        step: &'static str,
        status: ExitStatus,
        stderr: String,
    },
}

/// Commits the rendered report into a git checkout and pushes it.
///
/// Only the listed paths are staged and committed; anything else in the
/// checkout, including the program itself, is left alone.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GitPublisher {
    repo_dir: PathBuf,
    remote: String,
    branch: String,
    paths: Vec<PathBuf>,
}

impl GitPublisher {
    pub fn new(repo_dir: PathBuf, remote: String, branch: String, paths: Vec<PathBuf>) -> Self {
        Self {
            repo_dir,
            remote,
            branch,
            paths,
        }
    }

    /// The report path is made absolute against the working directory since
    /// git runs inside `publish.repo_dir`; extra paths are relative to the
    /// checkout.
    pub fn from_config(config: &ReportConfig) -> Self {
        let report = std::path::absolute(&config.report.output)
            .unwrap_or_else(|_| config.report.output.clone());
        let mut paths = vec![report];
        paths.extend(config.publish.paths.iter().cloned());

        Self::new(
            config.publish.repo_dir.clone(),
            config.publish.remote.clone(),
            config.publish.branch.clone(),
            paths,
        )
    }

    pub fn publish(&self) -> Result<PublishOutcome, PublishError> {
        self.run("add", self.with_paths(["add", "--"]))?;

        if !self.has_staged_changes()? {
            return Ok(PublishOutcome::NoChanges);
        }

        let message = format!(
            "Auto-update Jira report: {}",
            Local::now().format(TIMESTAMP_FORMAT)
        );
        self.run("commit", self.with_paths(["commit", "-m", message.as_str(), "--"]))?;
        self.run(
            "push",
            ["push", self.remote.as_str(), self.branch.as_str()].map(OsString::from),
        )?;

        debug!(remote = %self.remote, branch = %self.branch, "report pushed");
        Ok(PublishOutcome::Pushed { message })
    }

    fn has_staged_changes(&self) -> Result<bool, PublishError> {
        let step = "diff";
        let output = self.output(step, self.with_paths(["diff", "--cached", "--quiet", "--"]))?;
        // `--quiet` exits 1 when there are differences.
        match output.status.code() {
            Some(0) => Ok(false),
            Some(1) => Ok(true),
            _ => Err(failed(step, output)),
        }
    }

    fn with_paths<const N: usize>(&self, args: [&str; N]) -> Vec<OsString> {
        args.into_iter()
            .map(OsString::from)
            .chain(self.paths.iter().map(|path| path.as_os_str().to_os_string()))
            .collect()
    }

    fn run<I>(&self, step: &'static str, args: I) -> Result<(), PublishError>
    where
        I: IntoIterator<Item = OsString>,
    {
        let output = self.output(step, args)?;
        if !output.status.success() {
            return Err(failed(step, output));
        }
        Ok(())
    }

    fn output<I>(&self, step: &'static str, args: I) -> Result<Output, PublishError>
    where
        I: IntoIterator<Item = OsString>,
    {
        debug!(step, repo = %self.repo_dir.display(), "running git");
        Command::new("git")
            .current_dir(&self.repo_dir)
            .args(args)
            .output()
            .map_err(|source| PublishError::Spawn { step, source })
    }

    pub fn repo_dir(&self) -> &Path {
        &self.repo_dir
    }
}

fn failed(step: &'static str, output: Output) -> PublishError {
    PublishError::Failed {
        step,
        status: output.status,
        stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
    }
}
