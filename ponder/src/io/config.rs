//! Compile-time tunables for a thinking run.
//!
//! The binary has no runtime configuration surface: `Settings::default()`
//! carries the constants below. Tests build custom values to shorten pauses.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Result, anyhow};

use crate::core::pacing::Pacing;
use crate::core::transcript::ITERATION_MARKER;

pub const COMPLETION_ENDPOINT: &str = "http://localhost:8081/completion";
pub const TEMPERATURE: f32 = 0.8;
pub const MAX_TOKENS: u32 = 400;
pub const MAX_ITERATIONS: u32 = 50;
pub const POSTS_DIR: &str = "posts";
pub const INDEX_FILE: &str = "posts.json";
pub const ELLIPSIS: &str = "...";

/// Settings for the completion backend.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionSettings {
    pub endpoint: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub stop_sequences: Vec<String>,
    pub request_timeout: Duration,
    pub health_timeout: Duration,
}

impl Default for CompletionSettings {
    fn default() -> Self {
        Self {
            endpoint: COMPLETION_ENDPOINT.to_string(),
            temperature: TEMPERATURE,
            max_tokens: MAX_TOKENS,
            stop_sequences: vec![
                "\n\n\n".to_string(),
                "###".to_string(),
                ITERATION_MARKER.to_string(),
            ],
            request_timeout: Duration::from_secs(180),
            health_timeout: Duration::from_secs(5),
        }
    }
}

/// Iteration pacing and retry policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoopSettings {
    /// Hard cap on recorded iterations.
    pub max_iterations: u32,
    pub ramp_up_iterations: u32,
    pub short_pause: Duration,
    pub long_pause: Duration,
    /// Granularity at which pauses re-check for cancellation.
    pub pause_slice: Duration,
    /// Fixed wait after an empty completion.
    pub retry_backoff: Duration,
    /// Give up after this many empty completions in a row. `None` retries forever.
    pub max_consecutive_empty: Option<u32>,
}

impl Default for LoopSettings {
    fn default() -> Self {
        Self {
            max_iterations: MAX_ITERATIONS,
            ramp_up_iterations: 3,
            short_pause: Duration::from_secs(30),
            long_pause: Duration::from_secs(7200),
            pause_slice: Duration::from_secs(1),
            retry_backoff: Duration::from_secs(10),
            max_consecutive_empty: None,
        }
    }
}

impl LoopSettings {
    pub fn pacing(&self) -> Pacing {
        Pacing {
            ramp_up: self.ramp_up_iterations,
            short: self.short_pause,
            long: self.long_pause,
        }
    }
}

/// Output layout and index formatting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreSettings {
    pub posts_dir: PathBuf,
    pub index_file: String,
    pub preview_chars: usize,
    pub ellipsis: String,
    pub max_slug_chars: usize,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            posts_dir: PathBuf::from(POSTS_DIR),
            index_file: INDEX_FILE.to_string(),
            preview_chars: 200,
            ellipsis: ELLIPSIS.to_string(),
            max_slug_chars: 50,
        }
    }
}

impl StoreSettings {
    /// Same layout rooted under `root`.
    pub fn rooted_at(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        Self {
            posts_dir: root.join(POSTS_DIR),
            ..Self::default()
        }
    }
}

/// Publishing to the git remote.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishSettings {
    pub remote: String,
    pub push_timeout: Duration,
    pub output_limit_bytes: usize,
}

impl Default for PublishSettings {
    fn default() -> Self {
        Self {
            remote: "origin".to_string(),
            push_timeout: Duration::from_secs(120),
            output_limit_bytes: 16_000,
        }
    }
}

/// All tunables for one run.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Settings {
    pub completion: CompletionSettings,
    pub looping: LoopSettings,
    pub store: StoreSettings,
    pub publish: PublishSettings,
}

impl Settings {
    pub fn validate(&self) -> Result<()> {
        if self.completion.endpoint.trim().is_empty() {
            return Err(anyhow!("completion endpoint must be non-empty"));
        }
        if self.completion.max_tokens == 0 {
            return Err(anyhow!("max_tokens must be > 0"));
        }
        if self.completion.request_timeout.is_zero() {
            return Err(anyhow!("request_timeout must be > 0"));
        }
        if self.looping.max_iterations == 0 {
            return Err(anyhow!("max_iterations must be > 0"));
        }
        if self.looping.pause_slice.is_zero() {
            return Err(anyhow!("pause_slice must be > 0"));
        }
        if self.looping.max_consecutive_empty == Some(0) {
            return Err(anyhow!("max_consecutive_empty must be > 0 when set"));
        }
        if self.store.index_file.trim().is_empty() {
            return Err(anyhow!("index_file must be non-empty"));
        }
        if self.store.max_slug_chars == 0 {
            return Err(anyhow!("max_slug_chars must be > 0"));
        }
        if self.publish.push_timeout.is_zero() {
            return Err(anyhow!("push_timeout must be > 0"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        Settings::default().validate().expect("valid defaults");
    }

    #[test]
    fn defaults_match_published_constants() {
        let settings = Settings::default();
        assert_eq!(settings.looping.max_iterations, 50);
        assert_eq!(settings.looping.short_pause, Duration::from_secs(30));
        assert_eq!(settings.looping.long_pause, Duration::from_secs(7200));
        assert_eq!(settings.looping.retry_backoff, Duration::from_secs(10));
        assert_eq!(settings.looping.max_consecutive_empty, None);
        assert_eq!(settings.store.preview_chars, 200);
        assert!(
            settings
                .completion
                .stop_sequences
                .contains(&ITERATION_MARKER.to_string())
        );
    }

    #[test]
    fn zero_slice_is_rejected() {
        let mut settings = Settings::default();
        settings.looping.pause_slice = Duration::ZERO;
        let err = settings.validate().unwrap_err();
        assert!(err.to_string().contains("pause_slice"));
    }

    #[test]
    fn zero_retry_ceiling_is_rejected() {
        let mut settings = Settings::default();
        settings.looping.max_consecutive_empty = Some(0);
        assert!(settings.validate().is_err());
    }
}
