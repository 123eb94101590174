//! The iteration controller for one thinking run.
//!
//! Each iteration composes a prompt from the running transcript, asks the
//! completion backend to continue, records non-empty text, persists the whole
//! session, publishes, and then pauses according to the pacing schedule.
//!
//! Cancellation is cooperative: the token is checked before every request and
//! at every pause slice boundary. In-flight requests, persists and publishes
//! always run to completion. Publishing shells out to git, so it runs on the
//! blocking pool and the runtime keeps serving the signal handler meanwhile.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Local;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::core::pacing::slices;
use crate::core::transcript::Transcript;
use crate::core::types::{Iteration, Session};
use crate::io::completion::{CompletionClient, CompletionRequest};
use crate::io::config::Settings;
use crate::io::prompt::compose;
use crate::io::publish::{PublishOutcome, Publisher, checkpoint_label};
use crate::io::thought_store::{PersistReport, ThoughtStore};

/// Reason why `run_loop` stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoopStop {
    /// The iteration cap was reached.
    Completed,
    /// Cancellation was observed.
    Stopped,
    /// Too many empty completions in a row (only with a retry ceiling).
    RetriesExhausted { consecutive_empty: u32 },
}

/// Summary of a loop invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoopOutcome {
    pub session_id: String,
    pub iterations_recorded: u32,
    pub empty_responses: u32,
    pub stop: LoopStop,
}

/// Progress notifications for the caller (the binary prints them).
#[derive(Debug)]
pub enum LoopEvent<'a> {
    Requesting {
        index: u32,
    },
    EmptyResponse {
        index: u32,
        consecutive: u32,
        backoff: Duration,
    },
    Recorded {
        iteration: &'a Iteration,
        report: &'a PersistReport,
    },
    Published {
        index: u32,
        outcome: &'a PublishOutcome,
    },
    Pausing {
        after: u32,
        pause: Duration,
    },
}

/// The topic under exploration and the id its session is stored under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSpec {
    pub topic: String,
    pub session_id: String,
}

/// Collaborators the loop drives.
pub struct LoopDeps<'a, C, P> {
    pub client: &'a C,
    pub publisher: Arc<P>,
    pub store: &'a ThoughtStore,
}

/// Run iterations until the cap is reached, cancellation is observed, or the
/// optional retry ceiling is hit.
///
/// Persistence failures end the run with an error: the index upsert assumes
/// the previous snapshot was written. Publish failures are reported through
/// `on_event` and never stop the loop.
#[instrument(skip_all, fields(session_id = %spec.session_id))]
pub async fn run_loop<C, P, F>(
    spec: &SessionSpec,
    deps: LoopDeps<'_, C, P>,
    settings: &Settings,
    cancel: &CancellationToken,
    mut on_event: F,
) -> Result<LoopOutcome>
where
    C: CompletionClient,
    P: Publisher + 'static,
    F: FnMut(&LoopEvent<'_>),
{
    let pacing = settings.looping.pacing();
    let mut transcript = Transcript::new(&spec.topic);
    let mut session: Option<Session> = None;
    let mut empty_responses = 0u32;
    let mut consecutive_empty = 0u32;

    let outcome = |session: &Option<Session>, empty_responses: u32, stop: LoopStop| LoopOutcome {
        session_id: spec.session_id.clone(),
        iterations_recorded: session.as_ref().map_or(0, |s| s.current_iteration),
        empty_responses,
        stop,
    };

    loop {
        if cancel.is_cancelled() {
            info!("cancellation observed before request");
            return Ok(outcome(&session, empty_responses, LoopStop::Stopped));
        }

        let index = session.as_ref().map_or(1, Session::next_index);
        on_event(&LoopEvent::Requesting { index });
        let prompt = compose(&spec.topic, &transcript)?;
        let request = CompletionRequest::new(prompt, &settings.completion);
        let text = deps.client.complete(&request).await;

        if text.trim().is_empty() {
            empty_responses += 1;
            consecutive_empty += 1;
            if let Some(limit) = settings.looping.max_consecutive_empty
                && consecutive_empty >= limit
            {
                warn!(consecutive_empty, "retry ceiling reached");
                return Ok(outcome(
                    &session,
                    empty_responses,
                    LoopStop::RetriesExhausted { consecutive_empty },
                ));
            }
            let backoff = settings.looping.retry_backoff;
            warn!(index, consecutive_empty, "empty completion, backing off");
            on_event(&LoopEvent::EmptyResponse {
                index,
                consecutive: consecutive_empty,
                backoff,
            });
            if !sleep_unless_cancelled(backoff, settings.looping.pause_slice, cancel).await {
                info!("cancellation observed during backoff");
                return Ok(outcome(&session, empty_responses, LoopStop::Stopped));
            }
            continue;
        }
        consecutive_empty = 0;

        let iteration = Iteration {
            iteration: index,
            text,
            timestamp: Local::now(),
            duration: 0,
        };
        transcript.push(index, &iteration.text);
        let snapshot = session.get_or_insert_with(|| {
            Session::new(&spec.session_id, &spec.topic, iteration.timestamp)
        });
        snapshot.record(iteration);

        let report = deps
            .store
            .persist(snapshot)
            .with_context(|| format!("persist iteration {index}"))?;
        if let Some(recorded) = snapshot.thoughts.last() {
            on_event(&LoopEvent::Recorded {
                iteration: recorded,
                report: &report,
            });
        }

        let published = publish_blocking(
            Arc::clone(&deps.publisher),
            deps.store.posts_dir().to_path_buf(),
            checkpoint_label(index),
        )
        .await;
        debug!(index, ?published, "publish finished");
        on_event(&LoopEvent::Published {
            index,
            outcome: &published,
        });

        if index >= settings.looping.max_iterations {
            info!(index, "iteration cap reached");
            return Ok(outcome(&session, empty_responses, LoopStop::Completed));
        }

        let pause = pacing.pause_after(index);
        on_event(&LoopEvent::Pausing {
            after: index,
            pause,
        });
        if !sleep_unless_cancelled(pause, settings.looping.pause_slice, cancel).await {
            info!(index, "cancellation observed during pause");
            return Ok(outcome(&session, empty_responses, LoopStop::Stopped));
        }
    }
}

async fn publish_blocking<P: Publisher + 'static>(
    publisher: Arc<P>,
    scope: PathBuf,
    label: String,
) -> PublishOutcome {
    match tokio::task::spawn_blocking(move || publisher.publish(&scope, &label)).await {
        Ok(outcome) => outcome,
        Err(err) => PublishOutcome::Failed(format!("publish task failed: {err}")),
    }
}

/// Sleep `total` in slices of `slice`, checking `cancel` before each slice.
///
/// Returns `false` if cancellation was observed (including right after the last slice).
async fn sleep_unless_cancelled(
    total: Duration,
    slice: Duration,
    cancel: &CancellationToken,
) -> bool {
    for part in slices(total, slice) {
        if cancel.is_cancelled() {
            return false;
        }
        tokio::time::sleep(part).await;
    }
    !cancel.is_cancelled()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::config::StoreSettings;
    use crate::test_support::{RecordingPublisher, ScriptedCompletion};

    fn settings(root: &std::path::Path, max_iterations: u32) -> Settings {
        let mut settings = Settings {
            store: StoreSettings::rooted_at(root),
            ..Settings::default()
        };
        settings.looping.max_iterations = max_iterations;
        settings
    }

    fn spec() -> SessionSpec {
        SessionSpec {
            topic: "test".to_string(),
            session_id: "2026-10-19-test".to_string(),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn sleep_completes_without_cancellation() {
        let cancel = CancellationToken::new();
        let start = tokio::time::Instant::now();
        assert!(sleep_unless_cancelled(Duration::from_secs(30), Duration::from_secs(1), &cancel).await);
        assert_eq!(start.elapsed(), Duration::from_secs(30));
    }

    #[tokio::test(start_paused = true)]
    async fn sleep_stops_within_one_slice_of_cancellation() {
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(2500)).await;
            trigger.cancel();
        });
        let start = tokio::time::Instant::now();
        assert!(!sleep_unless_cancelled(Duration::from_secs(7200), Duration::from_secs(1), &cancel).await);
        assert!(start.elapsed() <= Duration::from_secs(3));
    }

    #[tokio::test(start_paused = true)]
    async fn runs_until_cap_and_skips_final_pause() {
        let temp = tempfile::tempdir().expect("tempdir");
        let settings = settings(temp.path(), 2);
        let store = ThoughtStore::new(settings.store.clone());
        let client = ScriptedCompletion::new(["one", "two"]);
        let publisher = Arc::new(RecordingPublisher::succeeding());
        let cancel = CancellationToken::new();
        let mut pauses = Vec::new();

        let outcome = run_loop(
            &spec(),
            LoopDeps {
                client: &client,
                publisher: Arc::clone(&publisher),
                store: &store,
            },
            &settings,
            &cancel,
            |event| {
                if let LoopEvent::Pausing { after, .. } = event {
                    pauses.push(*after);
                }
            },
        )
        .await
        .expect("loop");

        assert_eq!(outcome.stop, LoopStop::Completed);
        assert_eq!(outcome.iterations_recorded, 2);
        assert_eq!(pauses, vec![1]);
        assert_eq!(
            publisher.labels(),
            vec!["thoughts: iteration #1", "thoughts: iteration #2"]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn prompts_accumulate_previous_iterations() {
        let temp = tempfile::tempdir().expect("tempdir");
        let settings = settings(temp.path(), 3);
        let store = ThoughtStore::new(settings.store.clone());
        let client = ScriptedCompletion::new(["alpha", "beta", "gamma"]);
        let publisher = Arc::new(RecordingPublisher::succeeding());

        run_loop(
            &spec(),
            LoopDeps {
                client: &client,
                publisher: Arc::clone(&publisher),
                store: &store,
            },
            &settings,
            &CancellationToken::new(),
            |_| {},
        )
        .await
        .expect("loop");

        let prompts: Vec<String> = client.requests().into_iter().map(|r| r.prompt).collect();
        assert!(!prompts[0].contains("Iteration #1"));
        assert!(prompts[1].contains("Iteration #1:\nalpha"));
        assert!(prompts[2].contains("Iteration #1:\nalpha"));
        assert!(prompts[2].contains("Iteration #2:\nbeta"));
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_before_start_makes_no_requests() {
        let temp = tempfile::tempdir().expect("tempdir");
        let settings = settings(temp.path(), 5);
        let store = ThoughtStore::new(settings.store.clone());
        let client = ScriptedCompletion::new(Vec::<String>::new());
        let publisher = Arc::new(RecordingPublisher::succeeding());
        let cancel = CancellationToken::new();
        cancel.cancel();

        let outcome = run_loop(
            &spec(),
            LoopDeps {
                client: &client,
                publisher: Arc::clone(&publisher),
                store: &store,
            },
            &settings,
            &cancel,
            |_| {},
        )
        .await
        .expect("loop");

        assert_eq!(outcome.stop, LoopStop::Stopped);
        assert_eq!(outcome.iterations_recorded, 0);
        assert!(client.requests().is_empty());
        assert!(!store.index_path().exists());
    }

    #[tokio::test(start_paused = true)]
    async fn retry_ceiling_ends_run() {
        let temp = tempfile::tempdir().expect("tempdir");
        let mut settings = settings(temp.path(), 5);
        settings.looping.max_consecutive_empty = Some(2);
        let store = ThoughtStore::new(settings.store.clone());
        let client = ScriptedCompletion::new(["first", "", " "]);
        let publisher = Arc::new(RecordingPublisher::succeeding());

        let outcome = run_loop(
            &spec(),
            LoopDeps {
                client: &client,
                publisher: Arc::clone(&publisher),
                store: &store,
            },
            &settings,
            &CancellationToken::new(),
            |_| {},
        )
        .await
        .expect("loop");

        assert_eq!(
            outcome.stop,
            LoopStop::RetriesExhausted {
                consecutive_empty: 2
            }
        );
        assert_eq!(outcome.iterations_recorded, 1);
        assert_eq!(outcome.empty_responses, 2);
        let session = store.load_session("2026-10-19-test").expect("session");
        assert_eq!(session.current_iteration, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn persistence_failure_aborts_the_run() {
        let temp = tempfile::tempdir().expect("tempdir");
        let settings = settings(temp.path(), 5);
        // A file where the posts directory should be makes every write fail.
        std::fs::write(&settings.store.posts_dir, "not a dir").expect("write");
        let store = ThoughtStore::new(settings.store.clone());
        let client = ScriptedCompletion::new(["text"]);
        let publisher = Arc::new(RecordingPublisher::succeeding());

        let err = run_loop(
            &spec(),
            LoopDeps {
                client: &client,
                publisher: Arc::clone(&publisher),
                store: &store,
            },
            &settings,
            &CancellationToken::new(),
            |_| {},
        )
        .await
        .unwrap_err();

        assert!(err.to_string().contains("persist iteration 1"));
        assert!(publisher.labels().is_empty());
    }
}
