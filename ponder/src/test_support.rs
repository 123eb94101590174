//! Test-only helpers: sample data, scripted collaborators, and temp git repos.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Mutex;

use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use chrono::{Local, TimeZone};
use tempfile::TempDir;

use crate::core::types::{IndexEntry, Iteration, Session};
use crate::io::completion::{CompletionClient, CompletionRequest};
use crate::io::publish::{PublishOutcome, Publisher};

/// Deterministic iteration with a fixed timestamp.
pub fn iteration(index: u32, text: &str) -> Iteration {
    Iteration {
        iteration: index,
        text: text.to_string(),
        timestamp: fixed_time(),
        duration: 0,
    }
}

/// Session with one recorded iteration per entry of `texts`.
pub fn sample_session(id: &str, texts: &[&str]) -> Session {
    let mut session = Session::new(id, format!("{id} title"), fixed_time());
    for (position, text) in texts.iter().enumerate() {
        session.record(iteration(position as u32 + 1, text));
    }
    session
}

/// Index row with deterministic defaults.
pub fn index_entry(id: &str, iterations: u32) -> IndexEntry {
    IndexEntry {
        id: id.to_string(),
        title: format!("{id} title"),
        date: fixed_time(),
        content: format!("{id}..."),
        iterations,
        duration: u64::from(iterations) * 2,
    }
}

fn fixed_time() -> chrono::DateTime<Local> {
    Local
        .with_ymd_and_hms(2026, 10, 19, 12, 0, 0)
        .earliest()
        .unwrap_or_else(Local::now)
}

/// Completion client that replays scripted responses in order and records prompts.
///
/// Panics when asked for more responses than were scripted.
pub struct ScriptedCompletion {
    responses: Mutex<VecDeque<String>>,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl ScriptedCompletion {
    pub fn new<I, S>(responses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            responses: Mutex::new(responses.into_iter().map(Into::into).collect()),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Requests received so far.
    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().expect("requests lock").clone()
    }
}

#[async_trait]
impl CompletionClient for ScriptedCompletion {
    async fn complete(&self, request: &CompletionRequest) -> String {
        self.requests
            .lock()
            .expect("requests lock")
            .push(request.clone());
        self.responses
            .lock()
            .expect("responses lock")
            .pop_front()
            .expect("scripted completion exhausted")
    }
}

/// Publisher that records every call and replies with a fixed outcome.
pub struct RecordingPublisher {
    outcome: PublishOutcome,
    calls: Mutex<Vec<(PathBuf, String)>>,
}

impl RecordingPublisher {
    pub fn new(outcome: PublishOutcome) -> Self {
        Self {
            outcome,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn succeeding() -> Self {
        Self::new(PublishOutcome::Published {
            branch: "main".to_string(),
        })
    }

    pub fn failing() -> Self {
        Self::new(PublishOutcome::Failed("push rejected".to_string()))
    }

    /// Labels passed to `publish`, in call order.
    pub fn labels(&self) -> Vec<String> {
        self.calls
            .lock()
            .expect("calls lock")
            .iter()
            .map(|(_, label)| label.clone())
            .collect()
    }
}

impl Publisher for RecordingPublisher {
    fn publish(&self, scope: &Path, label: &str) -> PublishOutcome {
        self.calls
            .lock()
            .expect("calls lock")
            .push((scope.to_path_buf(), label.to_string()));
        self.outcome.clone()
    }
}

/// Temporary git work tree on branch `main`, optionally wired to a bare `origin`.
pub struct TestRepo {
    temp: TempDir,
    work: PathBuf,
    remote: Option<PathBuf>,
}

impl TestRepo {
    /// Work tree with a bare remote named `origin`.
    pub fn new() -> Result<Self> {
        let mut repo = Self::without_remote()?;
        let remote = repo.temp.path().join("remote.git");
        git(repo.temp.path(), &["init", "--bare", "-q", "remote.git"])?;
        let remote_arg = remote.to_string_lossy().to_string();
        git(&repo.work, &["remote", "add", "origin", &remote_arg])?;
        repo.remote = Some(remote);
        Ok(repo)
    }

    /// Work tree without any remote, so pushes fail.
    pub fn without_remote() -> Result<Self> {
        let temp = tempfile::tempdir().context("tempdir")?;
        let work = temp.path().join("work");
        std::fs::create_dir_all(&work).context("create work dir")?;
        git(&work, &["init", "-q"])?;
        git(&work, &["symbolic-ref", "HEAD", "refs/heads/main"])?;
        git(&work, &["config", "user.name", "Test"])?;
        git(&work, &["config", "user.email", "test@example.com"])?;
        git(&work, &["config", "commit.gpgsign", "false"])?;
        Ok(Self {
            temp,
            work,
            remote: None,
        })
    }

    pub fn path(&self) -> &Path {
        &self.work
    }

    /// Commit subjects on `branch` in the remote, newest first.
    pub fn remote_log(&self, branch: &str) -> Result<Vec<String>> {
        let remote = self
            .remote
            .as_ref()
            .ok_or_else(|| anyhow!("repo has no remote"))?;
        let out = git(remote, &["log", "--format=%s", branch])?;
        Ok(out.lines().map(str::to_string).collect())
    }
}

fn git(dir: &Path, args: &[&str]) -> Result<String> {
    let output = Command::new("git")
        .args(args)
        .current_dir(dir)
        .output()
        .with_context(|| format!("spawn git {}", args.join(" ")))?;
    if !output.status.success() {
        return Err(anyhow!(
            "git {} failed: {}",
            args.join(" "),
            String::from_utf8_lossy(&output.stderr).trim()
        ));
    }
    Ok(String::from_utf8_lossy(&output.stdout).to_string())
}
