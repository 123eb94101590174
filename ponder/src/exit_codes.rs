//! Stable exit codes for the `ponder` binary.

/// The run completed (iteration cap) or was stopped by the operator.
pub const OK: i32 = 0;
/// Empty topic, unreachable backend, invalid settings, or a persistence failure.
pub const INVALID: i32 = 1;
/// The completion backend returned nothing too many times in a row.
pub const EXHAUSTED: i32 = 2;
