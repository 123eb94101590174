//! Pause schedule between iterations: short ramp-up, then a long steady interval.

use std::time::Duration;

/// Pacing policy derived from settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pacing {
    /// Number of leading iterations that use `short`.
    pub ramp_up: u32,
    pub short: Duration,
    pub long: Duration,
}

impl Pacing {
    /// Pause that follows the iteration with the given 1-indexed `index`.
    pub fn pause_after(&self, index: u32) -> Duration {
        if index <= self.ramp_up {
            self.short
        } else {
            self.long
        }
    }
}

/// Split `total` into sleep slices of at most `slice`.
///
/// The last slice carries the remainder, so the sum always equals `total`.
pub fn slices(total: Duration, slice: Duration) -> impl Iterator<Item = Duration> {
    let mut remaining = total;
    std::iter::from_fn(move || {
        if remaining.is_zero() || slice.is_zero() {
            return None;
        }
        let next = remaining.min(slice);
        remaining -= next;
        Some(next)
    })
}
