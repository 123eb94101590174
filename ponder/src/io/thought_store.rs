//! Durable session snapshots plus the cross-session index.
//!
//! Layout under the posts directory:
//! - `<session-id>.json`: full snapshot, overwritten after every iteration.
//! - `posts.json`: index, read-modify-written in full after every iteration.
//!
//! Both files are written atomically (temp file + rename). The index is loaded
//! and updated in memory first, then the session file is written, then the index.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, instrument};

use crate::core::index::{entry_for, upsert};
use crate::core::invariants::{validate_index, validate_session};
use crate::core::session_id::disambiguated;
use crate::core::types::{IndexEntry, Session};
use crate::io::config::StoreSettings;

const INDEX_SCHEMA: &str = include_str!("../../../schemas/index.schema.json");

/// Paths touched by one persist call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistReport {
    pub session_path: PathBuf,
    pub index_path: PathBuf,
    /// True when the index gained a new entry (first persist of this session).
    pub inserted: bool,
}

/// File-backed store for sessions and the index.
#[derive(Debug, Clone)]
pub struct ThoughtStore {
    settings: StoreSettings,
}

impl ThoughtStore {
    pub fn new(settings: StoreSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &StoreSettings {
        &self.settings
    }

    pub fn posts_dir(&self) -> &Path {
        &self.settings.posts_dir
    }

    pub fn index_path(&self) -> PathBuf {
        self.settings.posts_dir.join(&self.settings.index_file)
    }

    pub fn session_path(&self, id: &str) -> PathBuf {
        self.settings.posts_dir.join(format!("{id}.json"))
    }

    /// Pick the first id derived from `base` that no earlier run has used.
    ///
    /// An id is taken if its session file exists or the index lists it.
    pub fn claim_session_id(&self, base: &str) -> Result<String> {
        let index = self.load_index()?;
        let mut attempt = 1;
        loop {
            let candidate = disambiguated(base, attempt);
            let in_index = index.iter().any(|entry| entry.id == candidate);
            if !in_index && !self.session_path(&candidate).exists() {
                debug!(id = %candidate, attempt, "claimed session id");
                return Ok(candidate);
            }
            attempt += 1;
        }
    }

    /// Write the full snapshot, then upsert its index entry and rewrite the index.
    ///
    /// The updated index is built and checked before anything touches disk, so
    /// an unreadable index leaves the previous snapshot in place.
    #[instrument(skip_all, fields(id = %session.id, iteration = session.current_iteration))]
    pub fn persist(&self, session: &Session) -> Result<PersistReport> {
        let errors = validate_session(session);
        if !errors.is_empty() {
            return Err(anyhow!("session invariants failed: {}", errors.join("; ")));
        }

        let mut index = self.load_index()?;
        let entry = entry_for(session, self.settings.preview_chars, &self.settings.ellipsis);
        let inserted = upsert(&mut index, entry);
        let errors = validate_index(&index);
        if !errors.is_empty() {
            return Err(anyhow!("index invariants failed: {}", errors.join("; ")));
        }

        let session_path = self.session_path(&session.id);
        write_json_atomic(&session_path, session)?;
        debug!(path = %session_path.display(), "session written");

        let index_path = self.index_path();
        write_json_atomic(&index_path, &index)?;
        debug!(path = %index_path.display(), entries = index.len(), inserted, "index written");

        Ok(PersistReport {
            session_path,
            index_path,
            inserted,
        })
    }

    /// Load a session snapshot by id.
    pub fn load_session(&self, id: &str) -> Result<Session> {
        let path = self.session_path(id);
        let contents = fs::read_to_string(&path)
            .with_context(|| format!("read session {}", path.display()))?;
        serde_json::from_str(&contents).with_context(|| format!("parse session {}", path.display()))
    }

    /// Load and validate the index; a missing file is an empty index.
    pub fn load_index(&self) -> Result<Vec<IndexEntry>> {
        let path = self.index_path();
        if !path.exists() {
            return Ok(Vec::new());
        }
        let contents =
            fs::read_to_string(&path).with_context(|| format!("read index {}", path.display()))?;
        let value: Value = serde_json::from_str(&contents)
            .with_context(|| format!("parse index {}", path.display()))?;
        validate_index_schema(&value)?;
        let index: Vec<IndexEntry> = serde_json::from_value(value)
            .with_context(|| format!("deserialize index {}", path.display()))?;
        let errors = validate_index(&index);
        if !errors.is_empty() {
            return Err(anyhow!("index invariants failed: {}", errors.join("; ")));
        }
        Ok(index)
    }
}

fn validate_index_schema(index: &Value) -> Result<()> {
    let schema: Value = serde_json::from_str(INDEX_SCHEMA).context("parse index schema")?;
    let compiled =
        jsonschema::validator_for(&schema).map_err(|err| anyhow!("invalid schema: {}", err))?;
    if !compiled.is_valid(index) {
        let messages = compiled
            .iter_errors(index)
            .map(|err| err.to_string())
            .collect::<Vec<_>>();
        return Err(anyhow!(
            "index schema validation failed: {}",
            messages.join("; ")
        ));
    }
    Ok(())
}

fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let mut buf = serde_json::to_string_pretty(value).context("serialize json")?;
    buf.push('\n');
    let parent = path
        .parent()
        .with_context(|| format!("path missing parent {}", path.display()))?;
    fs::create_dir_all(parent).with_context(|| format!("create directory {}", parent.display()))?;
    let tmp_path = path.with_extension("json.tmp");
    fs::write(&tmp_path, buf).with_context(|| format!("write temp {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("replace {}", path.display()))?;
    Ok(())
}
