//! Semantic invariants for persisted snapshots.

use std::collections::HashSet;

use crate::core::types::{IndexEntry, Session};

/// Check a session snapshot:
/// - `currentIteration == len(thoughts)`
/// - iteration indices are exactly `1..=currentIteration`
/// - `conclusion` equals the last iteration's text
pub fn validate_session(session: &Session) -> Vec<String> {
    let mut errors = Vec::new();

    if session.current_iteration as usize != session.thoughts.len() {
        errors.push(format!(
            "{}: currentIteration {} does not match {} thoughts",
            session.id,
            session.current_iteration,
            session.thoughts.len()
        ));
    }

    for (position, thought) in session.thoughts.iter().enumerate() {
        let expected = position as u32 + 1;
        if thought.iteration != expected {
            errors.push(format!(
                "{}: thought at position {} has iteration {} (expected {})",
                session.id, position, thought.iteration, expected
            ));
        }
    }

    if let Some(last) = session.thoughts.last()
        && last.text != session.conclusion
    {
        errors.push(format!(
            "{}: conclusion differs from the last thought",
            session.id
        ));
    }

    errors
}

/// Check that no session id appears twice in the index.
pub fn validate_index(index: &[IndexEntry]) -> Vec<String> {
    let mut seen = HashSet::new();
    index
        .iter()
        .filter(|entry| !seen.insert(entry.id.as_str()))
        .map(|entry| format!("duplicate index id '{}'", entry.id))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{index_entry, iteration, sample_session};

    #[test]
    fn well_formed_session_has_no_errors() {
        let mut session = sample_session("s", &["a"]);
        session.record(iteration(2, "b"));
        assert!(validate_session(&session).is_empty());
    }

    #[test]
    fn reports_counter_gap_and_conclusion_errors() {
        let mut session = sample_session("s", &["a"]);
        session.thoughts.push(iteration(3, "c"));
        session.conclusion = "stale".to_string();

        let errors = validate_session(&session);
        assert!(errors.iter().any(|err| err.contains("currentIteration")));
        assert!(errors.iter().any(|err| err.contains("expected 2")));
        assert!(errors.iter().any(|err| err.contains("conclusion")));
    }

    #[test]
    fn reports_duplicate_index_ids() {
        let index = vec![index_entry("a", 1), index_entry("b", 1), index_entry("a", 2)];
        let errors = validate_index(&index);
        assert_eq!(errors, vec!["duplicate index id 'a'".to_string()]);
    }
}
