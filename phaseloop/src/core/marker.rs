//! Phase markers: single-glyph commit subject prefixes.
//!
//! Every commit produced by a phase starts with exactly one marker glyph. The
//! harvester reads markers back from `git log` to decide what to run next, so
//! the glyph set is part of the on-disk contract and must not change.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Workflow phase tag carried by a commit subject.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Marker {
    /// User-authored change or code carrying human TODO markers.
    Human,
    Plan,
    Build,
    Learn,
    Cleanup,
    /// Plain code change with no workflow meaning.
    Fix,
    /// A brand new plan file.
    Seed,
    /// Annotations or edits on an existing plan file.
    Feedback,
    Explore,
}

impl Marker {
    /// All markers in recognition order.
    pub const ALL: [Marker; 9] = [
        Marker::Human,
        Marker::Plan,
        Marker::Build,
        Marker::Learn,
        Marker::Cleanup,
        Marker::Fix,
        Marker::Seed,
        Marker::Feedback,
        Marker::Explore,
    ];

    pub fn glyph(self) -> &'static str {
        match self {
            Marker::Human => "👤",
            Marker::Plan => "📋",
            Marker::Build => "🔨",
            Marker::Learn => "🧠",
            Marker::Cleanup => "🧹",
            Marker::Fix => "🔧",
            Marker::Seed => "🌱",
            Marker::Feedback => "💬",
            Marker::Explore => "🔍",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Marker::Human => "human",
            Marker::Plan => "plan",
            Marker::Build => "build",
            Marker::Learn => "learn",
            Marker::Cleanup => "cleanup",
            Marker::Fix => "fix",
            Marker::Seed => "seed",
            Marker::Feedback => "feedback",
            Marker::Explore => "explore",
        }
    }

    /// Markers that record a human contribution rather than an agent phase.
    ///
    /// These are skipped when looking for the phase to resume after feedback.
    pub fn is_human_authored(self) -> bool {
        matches!(self, Marker::Human | Marker::Fix)
    }
}

impl fmt::Display for Marker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parse the marker prefixing a commit subject.
///
/// Leading whitespace is ignored. Returns `None` for subjects without a
/// recognized glyph (e.g. commits made outside the workflow).
pub fn parse_marker(subject: &str) -> Option<Marker> {
    let subject = subject.trim_start();
    Marker::ALL
        .into_iter()
        .find(|marker| subject.starts_with(marker.glyph()))
}

/// Format a commit subject as `<glyph> <summary>`.
pub fn tag_subject(marker: Marker, summary: &str) -> String {
    format!("{} {}", marker.glyph(), summary.trim())
}
