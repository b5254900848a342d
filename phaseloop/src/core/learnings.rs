//! Detects commits that only touched the plan's Learnings section.

use crate::core::diff::parse_diff;
use crate::core::plan::{h2_heading, is_learnings_heading};

/// Half-open, 1-based line range `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineRange {
    pub start: usize,
    pub end: usize,
}

impl LineRange {
    pub fn contains(&self, line: usize) -> bool {
        self.start <= line && line < self.end
    }
}

/// Lines from the `## Learnings` heading up to (excluding) the next H2.
///
/// When Learnings is the last section the range runs one past the final line,
/// so appending at end of file stays inside it.
pub fn learnings_range(content: &str) -> Option<LineRange> {
    let lines: Vec<&str> = content.lines().collect();
    let start_idx = lines.iter().position(|line| is_learnings_heading(line))?;
    let end_idx = lines
        .iter()
        .enumerate()
        .skip(start_idx + 1)
        .find(|(_, line)| h2_heading(line).is_some())
        .map(|(idx, _)| idx)
        .unwrap_or(lines.len());
    Some(LineRange {
        start: start_idx + 1,
        end: end_idx + 1,
    })
}

/// True when `diff` has at least one hunk and every changed line maps to an
/// old-file line inside `range`.
///
/// Removed lines map to their own old line number. Added lines map to the old
/// line they follow, so an insertion directly under the heading or at the end
/// of the section counts as inside it.
pub fn is_only_learnings_modified(diff: &str, range: LineRange) -> bool {
    let mut saw_hunk = false;
    for file in parse_diff(diff) {
        for hunk in &file.hunks {
            saw_hunk = true;
            let Some(hunk_range) = hunk.range() else {
                return false;
            };
            // A zero-length old side names the line the insertion follows.
            let mut old_line = if hunk_range.old_count == 0 {
                hunk_range.old_start + 1
            } else {
                hunk_range.old_start
            };
            for line in &hunk.lines {
                match line.chars().next() {
                    Some('-') => {
                        if !range.contains(old_line) {
                            return false;
                        }
                        old_line += 1;
                    }
                    Some('+') => {
                        if !range.contains(old_line.saturating_sub(1)) {
                            return false;
                        }
                    }
                    Some('\\') => {}
                    _ => old_line += 1,
                }
            }
        }
    }
    saw_hunk
}
