//! I/O helpers for the thinking loop.

pub mod completion;
pub mod config;
pub mod git;
pub mod process;
pub mod prompt;
pub mod publish;
pub mod thought_store;
