//! Self-resuming thinking loop over a single topic.
//!
//! A run repeatedly asks a text-completion backend to continue reasoning about
//! one topic, feeds the growing transcript back as context, persists every
//! step as a replayable snapshot, and publishes the snapshot through git.
//!
//! - **[`core`]**: Pure, deterministic logic (ids, transcript, pacing, index
//!   maintenance, snapshot invariants). No I/O, fully testable in isolation.
//! - **[`io`]**: Side-effecting operations (HTTP completion, filesystem,
//!   git, child processes). Isolated behind traits so tests can script them.
//!
//! [`looping`] coordinates core logic with I/O to implement the run.

pub mod core;
pub mod exit_codes;
pub mod io;
pub mod logging;
pub mod looping;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
