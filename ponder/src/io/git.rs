//! Git adapter for publishing persisted thoughts.
//!
//! A small, explicit wrapper around `git` subprocess calls. Network operations
//! (push) run with a timeout so a stalled remote cannot hang the loop forever.

use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use tracing::{debug, instrument, warn};

use crate::io::process::{Exit, run_with_deadline};

/// Wrapper for executing git commands in a working directory.
#[derive(Debug, Clone)]
pub struct Git {
    workdir: PathBuf,
}

impl Git {
    pub fn new(workdir: impl Into<PathBuf>) -> Self {
        Self {
            workdir: workdir.into(),
        }
    }

    pub fn workdir(&self) -> &Path {
        &self.workdir
    }

    /// True if the working directory is inside a git work tree.
    pub fn is_work_tree(&self) -> Result<bool> {
        let out = self.run(&["rev-parse", "--is-inside-work-tree"])?;
        Ok(out.status.success() && String::from_utf8_lossy(&out.stdout).trim() == "true")
    }

    /// Return the current branch name (errors on detached HEAD).
    #[instrument(skip_all)]
    pub fn current_branch(&self) -> Result<String> {
        let out = self.run_capture(&["rev-parse", "--abbrev-ref", "HEAD"])?;
        let name = out.trim().to_string();
        if name == "HEAD" {
            warn!("detached HEAD detected");
            return Err(anyhow!("detached HEAD (refuse to push)"));
        }
        debug!(branch = %name, "current branch");
        Ok(name)
    }

    /// Stage everything under `scope` (respects .gitignore).
    pub fn add_path(&self, scope: &Path) -> Result<()> {
        let scope = scope.to_string_lossy();
        self.run_checked(&["add", "--", scope.as_ref()])?;
        Ok(())
    }

    /// True if there is anything staged for commit.
    pub fn has_staged_changes(&self) -> Result<bool> {
        let out = self.run(&["diff", "--cached", "--name-only"])?;
        Ok(!String::from_utf8_lossy(&out.stdout).trim().is_empty())
    }

    /// Commit staged changes with a message.
    ///
    /// If there are no staged changes, this returns Ok(false) and does nothing.
    #[instrument(skip_all)]
    pub fn commit_staged(&self, message: &str) -> Result<bool> {
        if !self.has_staged_changes()? {
            debug!("no staged changes, skipping commit");
            return Ok(false);
        }
        debug!("committing staged changes");
        self.run_checked(&["commit", "-m", message])?;
        Ok(true)
    }

    /// Push `branch` to `remote`, killing the push if it exceeds `timeout`.
    #[instrument(skip_all, fields(remote, branch))]
    pub fn push(
        &self,
        remote: &str,
        branch: &str,
        timeout: Duration,
        output_limit_bytes: usize,
    ) -> Result<()> {
        let mut cmd = Command::new("git");
        cmd.args(["push", remote, branch]).current_dir(&self.workdir);
        let run = run_with_deadline(cmd, timeout, output_limit_bytes)
            .with_context(|| format!("run git push {remote} {branch}"))?;
        match run.exit {
            Exit::Killed => Err(anyhow!("git push timed out after {timeout:?}")),
            Exit::Finished(_) if !run.succeeded() => {
                Err(anyhow!("git push failed: {}", run.stderr_text()))
            }
            Exit::Finished(_) => {
                debug!("push completed");
                Ok(())
            }
        }
    }

    fn run_capture(&self, args: &[&str]) -> Result<String> {
        let output = self.run_checked(args)?;
        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }

    fn run_checked(&self, args: &[&str]) -> Result<Output> {
        let output = self.run(args)?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(anyhow!("git {} failed: {}", args.join(" "), stderr.trim()));
        }
        Ok(output)
    }

    fn run(&self, args: &[&str]) -> Result<Output> {
        Command::new("git")
            .args(args)
            .current_dir(&self.workdir)
            .output()
            .with_context(|| format!("spawn git {}", args.join(" ")))
    }
}
