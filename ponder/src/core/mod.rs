//! Deterministic, pure logic shared by the thinking loop.
//!
//! Core modules must be free of I/O side effects. They operate on in-memory
//! data structures and return deterministic outputs suitable for tests.

pub mod index;
pub mod invariants;
pub mod pacing;
pub mod session_id;
pub mod transcript;
pub mod types;
