//! Commit subject shaping for agent-written summaries.

use crate::core::marker::{Marker, tag_subject};

/// Maximum commit subject length in characters, glyph included.
pub const MAX_SUBJECT_CHARS: usize = 72;

/// Summary used when the agent produced nothing usable.
pub const FALLBACK_SUMMARY: &str = "update";

/// Build `<glyph> <summary>` from raw agent output.
///
/// Takes the first non-empty line, strips quotes and backticks, and truncates
/// to [`MAX_SUBJECT_CHARS`]. Falls back to `<glyph> update` when nothing is
/// left.
pub fn commit_subject(marker: Marker, raw: Option<&str>) -> String {
    let summary = raw.map(clean_summary).unwrap_or_default();
    let summary = if summary.is_empty() {
        FALLBACK_SUMMARY.to_string()
    } else {
        summary
    };
    truncate_chars(&tag_subject(marker, &summary), MAX_SUBJECT_CHARS)
}

fn clean_summary(raw: &str) -> String {
    let line = raw
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .unwrap_or_default();
    let stripped: String = line
        .chars()
        .filter(|c| !matches!(c, '"' | '\'' | '`'))
        .collect();
    let stripped = stripped.trim();
    // Agents sometimes echo a marker of their own; keep only ours.
    let stripped = Marker::ALL
        .iter()
        .find_map(|m| stripped.strip_prefix(m.glyph()))
        .unwrap_or(stripped);
    stripped.trim().to_string()
}

fn truncate_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((idx, _)) => text[..idx].trim_end().to_string(),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_quotes_and_extra_lines() {
        let subject = commit_subject(Marker::Build, Some("\n  \"Add `login` route\"\nmore detail\n"));
        assert_eq!(subject, "🔨 Add login route");
    }

    #[test]
    fn empty_or_missing_output_falls_back() {
        assert_eq!(commit_subject(Marker::Fix, None), "🔧 update");
        assert_eq!(commit_subject(Marker::Fix, Some("  \n\"\"\n")), "🔧 update");
    }

    #[test]
    fn subject_is_capped_at_72_chars() {
        let long = "word ".repeat(40);
        let subject = commit_subject(Marker::Plan, Some(&long));
        assert!(subject.chars().count() <= MAX_SUBJECT_CHARS);
        assert!(subject.starts_with("📋 word"));
    }

    #[test]
    fn echoed_marker_is_dropped() {
        let subject = commit_subject(Marker::Learn, Some("🧠 record cache finding"));
        assert_eq!(subject, "🧠 record cache finding");
    }
}
