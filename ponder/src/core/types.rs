//! Persisted data model for sessions and the cross-session index.
//!
//! Field names serialize in camelCase because the JSON files are read by the
//! static site that renders the posts.
//!
//! Instants are written as RFC 3339. On read, an ISO-8601 value without an
//! offset (what earlier tooling wrote into the same posts directory) is taken
//! as local time.

use chrono::{DateTime, Local, NaiveDateTime};
use serde::{Deserialize, Deserializer, Serialize};

/// One unit of generated text plus its sequence number.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Iteration {
    /// 1-indexed, strictly increasing, no gaps.
    pub iteration: u32,
    pub text: String,
    #[serde(deserialize_with = "local_instant")]
    pub timestamp: DateTime<Local>,
    pub duration: u64,
}

/// Full durable record of one topic's run (`posts/<id>.json`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub id: String,
    pub title: String,
    /// Creation instant of the session (first recorded iteration).
    #[serde(deserialize_with = "local_instant")]
    pub date: DateTime<Local>,
    pub thoughts: Vec<Iteration>,
    /// Text of the latest iteration.
    pub conclusion: String,
    pub total_duration: u64,
    pub current_iteration: u32,
}

impl Session {
    /// Empty session created at `date`; it gains content through [`Session::record`].
    pub fn new(id: impl Into<String>, title: impl Into<String>, date: DateTime<Local>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            date,
            thoughts: Vec::new(),
            conclusion: String::new(),
            total_duration: 0,
            current_iteration: 0,
        }
    }

    /// Append an iteration and refresh the derived fields.
    pub fn record(&mut self, iteration: Iteration) {
        self.conclusion = iteration.text.clone();
        self.thoughts.push(iteration);
        self.current_iteration = self.thoughts.len() as u32;
        self.total_duration = u64::from(self.current_iteration) * 2;
    }

    /// Index assigned to the next recorded iteration.
    pub fn next_index(&self) -> u32 {
        self.current_iteration + 1
    }
}

/// Summary row in the cross-session index (`posts/posts.json`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexEntry {
    pub id: String,
    pub title: String,
    #[serde(deserialize_with = "local_instant")]
    pub date: DateTime<Local>,
    /// Preview of the conclusion, always followed by the ellipsis marker.
    pub content: String,
    pub iterations: u32,
    pub duration: u64,
}

/// Parse an RFC 3339 instant, or a naive ISO-8601 one as local time.
pub fn parse_local_instant(raw: &str) -> Result<DateTime<Local>, String> {
    if let Ok(instant) = DateTime::parse_from_rfc3339(raw) {
        return Ok(instant.with_timezone(&Local));
    }
    let naive: NaiveDateTime = raw
        .parse()
        .map_err(|err| format!("invalid instant {raw:?}: {err}"))?;
    naive
        .and_local_timezone(Local)
        .earliest()
        .ok_or_else(|| format!("instant {raw:?} does not exist in the local time zone"))
}

fn local_instant<'de, D>(deserializer: D) -> Result<DateTime<Local>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_local_instant(&raw).map_err(serde::de::Error::custom)
}
