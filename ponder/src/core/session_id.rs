//! Session identifier derivation: `<YYYY-MM-DD>-<slug>`.

use std::sync::LazyLock;

use chrono::NaiveDate;
use regex::Regex;

/// Slug used when a topic contains no letters or digits.
const FALLBACK_SLUG: &str = "topic";

static SEPARATOR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^a-z0-9а-яё]+").expect("slug pattern should be valid"));

/// Normalize a topic into a filesystem-safe slug of at most `max_chars` characters.
///
/// Lowercases, collapses every run of other characters into a single `-`, and
/// trims leading/trailing dashes (also after the length cap).
pub fn slugify(topic: &str, max_chars: usize) -> String {
    let lowered = topic.to_lowercase();
    let collapsed = SEPARATOR_RE.replace_all(&lowered, "-");
    let capped: String = collapsed.trim_matches('-').chars().take(max_chars).collect();
    let slug = capped.trim_end_matches('-');
    if slug.is_empty() {
        FALLBACK_SLUG.to_string()
    } else {
        slug.to_string()
    }
}

/// Derive the base session id for a topic started on `date`.
pub fn session_id(date: NaiveDate, topic: &str, max_slug_chars: usize) -> String {
    format!("{}-{}", date.format("%Y-%m-%d"), slugify(topic, max_slug_chars))
}

/// Candidate ids for a base id: the base itself, then `-2`, `-3`, ...
pub fn disambiguated(base: &str, attempt: u32) -> String {
    if attempt <= 1 {
        base.to_string()
    } else {
        format!("{base}-{attempt}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 19).expect("valid date")
    }

    #[test]
    fn simple_topic_produces_dated_id() {
        assert_eq!(session_id(day(), "test", 50), "2026-10-19-test");
    }

    #[test]
    fn punctuation_collapses_to_single_dash() {
        assert_eq!(slugify("  What is   Time?!  ", 50), "what-is-time");
        assert_eq!(slugify("a.b,,c", 50), "a-b-c");
    }

    #[test]
    fn cyrillic_letters_are_kept() {
        assert_eq!(slugify("Смысл Жизни", 50), "смысл-жизни");
    }

    #[test]
    fn slug_is_capped_by_characters_without_trailing_dash() {
        let slug = slugify("abcd efgh", 5);
        assert_eq!(slug, "abcd");
        let long = slugify(&"x".repeat(80), 50);
        assert_eq!(long.chars().count(), 50);
    }

    #[test]
    fn empty_slug_falls_back() {
        assert_eq!(slugify("?!?", 50), "topic");
        assert_eq!(session_id(day(), "", 50), "2026-10-19-topic");
    }

    #[test]
    fn disambiguation_suffixes_start_at_two() {
        assert_eq!(disambiguated("2026-10-19-test", 1), "2026-10-19-test");
        assert_eq!(disambiguated("2026-10-19-test", 2), "2026-10-19-test-2");
        assert_eq!(disambiguated("2026-10-19-test", 3), "2026-10-19-test-3");
    }
}
