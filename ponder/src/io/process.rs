//! Child processes that must finish before a deadline.
//!
//! Only `git push` goes through here: it talks to the network and can hang on
//! a dead remote, so it gets a deadline and bounded capture. Both pipes are
//! drained on scoped threads while the parent waits, so a chatty child never
//! blocks on a full pipe.

use std::io::{self, ErrorKind, Read};
use std::process::{Command, ExitStatus, Stdio};
use std::thread::{self, ScopedJoinHandle};
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use tracing::{debug, instrument, warn};
use wait_timeout::ChildExt;

/// How a child run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Exit {
    Finished(ExitStatus),
    /// The deadline passed and the child was killed.
    Killed,
}

/// Exit plus what was kept of the child's output.
#[derive(Debug)]
pub struct ChildRun {
    pub exit: Exit,
    /// First bytes of stdout.
    pub stdout: Vec<u8>,
    /// Last bytes of stderr; git puts the rejection reason at the end.
    pub stderr_tail: Vec<u8>,
}

impl ChildRun {
    pub fn succeeded(&self) -> bool {
        matches!(self.exit, Exit::Finished(status) if status.success())
    }

    pub fn stderr_text(&self) -> String {
        String::from_utf8_lossy(&self.stderr_tail).trim().to_string()
    }
}

#[derive(Debug, Clone, Copy)]
enum Keep {
    Head(usize),
    Tail(usize),
}

/// Run `cmd` with stdin closed, killing it once `deadline` passes.
///
/// At most `keep_bytes` of each stream is retained.
#[instrument(skip_all, fields(deadline_ms = deadline.as_millis() as u64, keep_bytes))]
pub fn run_with_deadline(
    mut cmd: Command,
    deadline: Duration,
    keep_bytes: usize,
) -> Result<ChildRun> {
    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    let mut child = cmd.spawn().context("spawn child")?;
    let stdout = child.stdout.take().context("stdout not captured")?;
    let stderr = child.stderr.take().context("stderr not captured")?;

    thread::scope(|scope| -> Result<ChildRun> {
        let head = scope.spawn(move || drain(stdout, Keep::Head(keep_bytes)));
        let tail = scope.spawn(move || drain(stderr, Keep::Tail(keep_bytes)));

        let exit = match child.wait_timeout(deadline).context("wait for child")? {
            Some(status) => Exit::Finished(status),
            None => {
                warn!("child exceeded its deadline, killing");
                child.kill().context("kill child")?;
                child.wait().context("reap killed child")?;
                Exit::Killed
            }
        };
        debug!(?exit, "child done");

        Ok(ChildRun {
            exit,
            stdout: joined(head).context("stdout")?,
            stderr_tail: joined(tail).context("stderr")?,
        })
    })
}

fn joined(handle: ScopedJoinHandle<'_, io::Result<Vec<u8>>>) -> Result<Vec<u8>> {
    handle
        .join()
        .map_err(|_| anyhow!("pipe reader panicked"))?
        .context("read pipe")
}

fn drain<R: Read>(mut pipe: R, keep: Keep) -> io::Result<Vec<u8>> {
    let mut kept = Vec::new();
    let mut chunk = [0u8; 4096];
    loop {
        let n = match pipe.read(&mut chunk) {
            Ok(0) => return Ok(kept),
            Ok(n) => n,
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            Err(err) => return Err(err),
        };
        match keep {
            Keep::Head(limit) => {
                let room = limit.saturating_sub(kept.len());
                kept.extend_from_slice(&chunk[..n.min(room)]);
            }
            Keep::Tail(limit) => {
                kept.extend_from_slice(&chunk[..n]);
                if kept.len() > limit {
                    let excess = kept.len() - limit;
                    kept.drain(..excess);
                }
            }
        }
    }
}
