//! Running context string fed back to the completion backend.

/// Literal marker that labels each iteration block in the context.
///
/// Also used as a stop sequence so the backend does not start a new block.
pub const ITERATION_MARKER: &str = "Iteration";

/// Accumulated free-text transcript: topic header plus one labeled block per
/// recorded iteration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transcript {
    text: String,
}

impl Transcript {
    pub fn new(topic: &str) -> Self {
        Self {
            text: format!("Topic: {topic}\n\nBeginning of reflection:"),
        }
    }

    /// Extend the context with a labeled block for iteration `index`.
    pub fn push(&mut self, index: u32, text: &str) {
        self.text
            .push_str(&format!("\n\n{ITERATION_MARKER} #{index}:\n{text}"));
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }
}
