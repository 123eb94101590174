//! Prompt rendering for the next completion request.

use std::sync::LazyLock;

use anyhow::{Context, Result};
use minijinja::{Environment, context};

use crate::core::transcript::{ITERATION_MARKER, Transcript};

const CONTINUE_TEMPLATE: &str = include_str!("prompts/continue.md");

static ENGINE: LazyLock<Environment<'static>> = LazyLock::new(|| {
    let mut env = Environment::new();
    env.add_template("continue", CONTINUE_TEMPLATE)
        .expect("continue template should be valid");
    env
});

/// Build the prompt asking the backend to keep exploring `topic`.
///
/// Pure: the output depends only on the topic and the accumulated transcript.
pub fn compose(topic: &str, transcript: &Transcript) -> Result<String> {
    let template = ENGINE
        .get_template("continue")
        .context("load continue template")?;
    let rendered = template
        .render(context! {
            context => transcript.as_str(),
            topic => topic,
            marker => ITERATION_MARKER,
        })
        .context("render continue template")?;
    Ok(rendered)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_carries_full_transcript_and_topic() {
        let mut transcript = Transcript::new("free will");
        transcript.push(1, "first angle");
        transcript.push(2, "second angle");

        let prompt = compose("free will", &transcript).expect("compose");
        assert!(prompt.contains("Topic to reflect on: free will"));
        assert!(prompt.contains("Iteration #1:\nfirst angle"));
        assert!(prompt.contains("Iteration #2:\nsecond angle"));
    }

    #[test]
    fn prompt_discourages_conclusions_and_markers() {
        let prompt = compose("t", &Transcript::new("t")).expect("compose");
        assert!(prompt.contains("Do not give a final answer"));
        assert!(prompt.contains("3-5 sentences"));
        assert!(prompt.contains("Never write the word \"Iteration\""));
    }

    #[test]
    fn compose_is_deterministic() {
        let transcript = Transcript::new("t");
        assert_eq!(
            compose("t", &transcript).expect("first"),
            compose("t", &transcript).expect("second")
        );
    }
}
