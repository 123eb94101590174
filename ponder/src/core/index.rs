//! Cross-session index maintenance: preview truncation and upsert ordering.

use crate::core::types::{IndexEntry, Session};

/// First `max_chars` characters of `conclusion` followed by `marker`.
///
/// The marker is appended even when no truncation happened.
pub fn preview(conclusion: &str, max_chars: usize, marker: &str) -> String {
    let mut out: String = conclusion.chars().take(max_chars).collect();
    out.push_str(marker);
    out
}

/// Build the index row that mirrors `session`.
pub fn entry_for(session: &Session, preview_chars: usize, marker: &str) -> IndexEntry {
    IndexEntry {
        id: session.id.clone(),
        title: session.title.clone(),
        date: session.date,
        content: preview(&session.conclusion, preview_chars, marker),
        iterations: session.current_iteration,
        duration: session.total_duration,
    }
}

/// Update the entry with the same id in place, or insert it at the front.
///
/// Returns `true` when a new entry was inserted.
pub fn upsert(index: &mut Vec<IndexEntry>, entry: IndexEntry) -> bool {
    match index.iter_mut().find(|existing| existing.id == entry.id) {
        Some(existing) => {
            *existing = entry;
            false
        }
        None => {
            index.insert(0, entry);
            true
        }
    }
}
