//! Interactive entry point: asks for a topic, then thinks about it until the
//! iteration cap is reached or the operator presses Ctrl+C.
//!
//! Snapshots land in `posts/` under the current directory and are pushed with
//! git after every iteration.

use std::io::{BufRead, Write};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Local;
use clap::Parser;
use tokio_util::sync::CancellationToken;

use ponder::core::session_id::session_id;
use ponder::exit_codes;
use ponder::io::completion::LlamaClient;
use ponder::io::config::Settings;
use ponder::io::git::Git;
use ponder::io::publish::{GitPublisher, PublishOutcome};
use ponder::io::thought_store::ThoughtStore;
use ponder::logging;
use ponder::looping::{LoopDeps, LoopEvent, LoopOutcome, LoopStop, SessionSpec, run_loop};

#[derive(Parser)]
#[command(
    name = "ponder",
    version,
    about = "Think about one topic, one short step at a time, with a local completion server"
)]
struct Cli {}

fn main() {
    logging::init();
    let _cli = Cli::parse();
    let code = match run() {
        Ok(code) => code,
        Err(err) => {
            eprintln!("{:#}", err);
            exit_codes::INVALID
        }
    };
    std::process::exit(code);
}

fn run() -> Result<i32> {
    let settings = Settings::default();
    settings.validate()?;

    let Some(topic) = read_topic()? else {
        eprintln!("topic must not be empty");
        return Ok(exit_codes::INVALID);
    };

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("build tokio runtime")?;
    runtime.block_on(think(topic, settings))
}

fn read_topic() -> Result<Option<String>> {
    print!("Enter a topic to think about: ");
    std::io::stdout().flush().context("flush stdout")?;
    let mut line = String::new();
    std::io::stdin()
        .lock()
        .read_line(&mut line)
        .context("read topic")?;
    let topic = line.trim();
    Ok((!topic.is_empty()).then(|| topic.to_string()))
}

async fn think(topic: String, settings: Settings) -> Result<i32> {
    let client = LlamaClient::new(&settings.completion)?;
    if let Err(err) = client.health().await {
        eprintln!("{:#}", err);
        eprintln!("start the completion server and try again");
        return Ok(exit_codes::INVALID);
    }

    let git = Git::new(".");
    if !git.is_work_tree().unwrap_or(false) {
        eprintln!("warning: current directory is not a git work tree; publishing will fail");
    }

    let store = ThoughtStore::new(settings.store.clone());
    let base_id = session_id(
        Local::now().date_naive(),
        &topic,
        settings.store.max_slug_chars,
    );
    let spec = SessionSpec {
        session_id: store.claim_session_id(&base_id)?,
        topic,
    };
    let publisher = Arc::new(GitPublisher::new(git, settings.publish.clone()));

    println!("Topic: {}", spec.topic);
    println!("Session: {}", spec.session_id);
    println!(
        "First {} iterations pause {}, later ones {}. Press Ctrl+C to stop.",
        settings.looping.ramp_up_iterations,
        human(settings.looping.short_pause),
        human(settings.looping.long_pause)
    );

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("\nstop requested; finishing the current step");
            trigger.cancel();
        }
    });

    let outcome = run_loop(
        &spec,
        LoopDeps {
            client: &client,
            publisher,
            store: &store,
        },
        &settings,
        &cancel,
        print_event,
    )
    .await?;

    print_summary(&outcome, store.posts_dir());
    Ok(match outcome.stop {
        LoopStop::Completed | LoopStop::Stopped => exit_codes::OK,
        LoopStop::RetriesExhausted { .. } => exit_codes::EXHAUSTED,
    })
}

fn print_event(event: &LoopEvent<'_>) {
    match event {
        LoopEvent::Requesting { index } => {
            println!("\n[{}] Iteration #{index}", Local::now().format("%H:%M:%S"));
        }
        LoopEvent::EmptyResponse {
            consecutive,
            backoff,
            ..
        } => {
            println!(
                "no text generated ({consecutive} in a row); retrying in {}",
                human(*backoff)
            );
        }
        LoopEvent::Recorded { iteration, report } => {
            println!("\n{}\n", iteration.text);
            println!("  saved {}", report.session_path.display());
            println!("  index {}", report.index_path.display());
        }
        LoopEvent::Published { outcome, .. } => match outcome {
            PublishOutcome::Published { branch } => println!("  published (branch {branch})"),
            PublishOutcome::NothingToPublish => println!("  nothing to publish"),
            PublishOutcome::Failed(message) => println!("  publish failed: {message}"),
        },
        LoopEvent::Pausing { pause, .. } => {
            println!("next iteration in {}", human(*pause));
        }
    }
}

fn print_summary(outcome: &LoopOutcome, posts_dir: &Path) {
    match &outcome.stop {
        LoopStop::Completed => println!("\niteration cap reached"),
        LoopStop::Stopped => println!("\nstopped"),
        LoopStop::RetriesExhausted { consecutive_empty } => {
            println!("\ngave up after {consecutive_empty} empty responses in a row");
        }
    }
    println!(
        "{} iterations recorded for {} ({} empty responses) in {}",
        outcome.iterations_recorded,
        outcome.session_id,
        outcome.empty_responses,
        posts_dir.display()
    );
}

fn human(duration: Duration) -> String {
    let secs = duration.as_secs();
    if secs >= 3600 && secs % 3600 == 0 {
        format!("{} h", secs / 3600)
    } else if secs >= 60 && secs % 60 == 0 {
        format!("{} min", secs / 60)
    } else {
        format!("{secs} s")
    }
}
