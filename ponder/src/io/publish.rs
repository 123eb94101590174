//! Publishing persisted thoughts to a remote-visible location.
//!
//! Publishing never fails the loop: every problem is reported as
//! [`PublishOutcome::Failed`] and the caller logs it and moves on.

use std::path::Path;

use anyhow::{Result, anyhow};
use tracing::{debug, info, instrument, warn};

use crate::io::config::PublishSettings;
use crate::io::git::Git;

/// Result of one publish attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublishOutcome {
    /// A checkpoint was created and pushed to `branch`.
    Published { branch: String },
    /// Nothing was staged under the scope.
    NothingToPublish,
    /// Scope not under version control, push rejected, or transport error.
    Failed(String),
}

/// Abstraction over publishing backends.
///
/// Implementations block; the loop calls them from the blocking pool.
pub trait Publisher: Send + Sync {
    /// Stage changes under `scope`, checkpoint them with `label`, and propagate.
    fn publish(&self, scope: &Path, label: &str) -> PublishOutcome;
}

/// Publisher that commits and pushes with `git`.
pub struct GitPublisher {
    git: Git,
    settings: PublishSettings,
}

impl GitPublisher {
    pub fn new(git: Git, settings: PublishSettings) -> Self {
        Self { git, settings }
    }

    fn try_publish(&self, scope: &Path, label: &str) -> Result<PublishOutcome> {
        if !self.git.is_work_tree()? {
            return Err(anyhow!(
                "not a git repository: {}",
                self.git.workdir().display()
            ));
        }
        self.git.add_path(scope)?;
        if !self.git.commit_staged(label)? {
            return Ok(PublishOutcome::NothingToPublish);
        }
        let branch = self.git.current_branch()?;
        self.git.push(
            &self.settings.remote,
            &branch,
            self.settings.push_timeout,
            self.settings.output_limit_bytes,
        )?;
        Ok(PublishOutcome::Published { branch })
    }
}

impl Publisher for GitPublisher {
    #[instrument(skip_all, fields(scope = %scope.display(), label))]
    fn publish(&self, scope: &Path, label: &str) -> PublishOutcome {
        match self.try_publish(scope, label) {
            Ok(PublishOutcome::Published { branch }) => {
                info!(branch = %branch, "published");
                PublishOutcome::Published { branch }
            }
            Ok(outcome) => {
                debug!(?outcome, "publish finished");
                outcome
            }
            Err(err) => {
                let message = format!("{err:#}");
                warn!(err = %message, "publish failed");
                PublishOutcome::Failed(message)
            }
        }
    }
}

/// Checkpoint label for iteration `index`.
pub fn checkpoint_label(index: u32) -> String {
    format!("thoughts: iteration #{index}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::TestRepo;
    use std::fs;

    fn publisher(root: &Path) -> GitPublisher {
        GitPublisher::new(Git::new(root), PublishSettings::default())
    }

    #[test]
    fn outside_a_repository_reports_failure() {
        let temp = tempfile::tempdir().expect("tempdir");
        fs::create_dir_all(temp.path().join("posts")).expect("mkdir");
        let outcome = publisher(temp.path()).publish(Path::new("posts"), "label");
        match outcome {
            PublishOutcome::Failed(message) => assert!(message.contains("not a git repository")),
            other => panic!("expected failure, got {other:?}"),
        }
    }

    #[test]
    fn publishes_then_reports_nothing_to_publish() {
        let repo = TestRepo::new().expect("repo");
        fs::create_dir_all(repo.path().join("posts")).expect("mkdir");
        fs::write(repo.path().join("posts/posts.json"), "[]\n").expect("write");
        let publisher = publisher(repo.path());

        let first = publisher.publish(Path::new("posts"), &checkpoint_label(1));
        assert_eq!(
            first,
            PublishOutcome::Published {
                branch: "main".to_string()
            }
        );
        assert_eq!(
            repo.remote_log("main").expect("log"),
            vec!["thoughts: iteration #1"]
        );

        let second = publisher.publish(Path::new("posts"), &checkpoint_label(2));
        assert_eq!(second, PublishOutcome::NothingToPublish);
    }

    #[test]
    fn rejected_push_reports_failure() {
        let repo = TestRepo::without_remote().expect("repo");
        fs::create_dir_all(repo.path().join("posts")).expect("mkdir");
        fs::write(repo.path().join("posts/posts.json"), "[]\n").expect("write");

        let outcome = publisher(repo.path()).publish(Path::new("posts"), "label");
        assert!(matches!(outcome, PublishOutcome::Failed(_)));
    }
}
