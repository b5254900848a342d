//! Workflow state machine: repository observations in, next step out.
//!
//! `infer_step` is pure and total. Every marker (plus "no marker") has a
//! branch, and adding a marker must add a branch here rather than fall through.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::core::marker::Marker;

/// Repository observables gathered fresh on every invocation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Observation {
    pub has_uncommitted_changes: bool,
    pub last_commit_prefix: Option<Marker>,
    pub has_unchecked_items: bool,
    /// The last (human) commit touched nothing but the plan's Learnings section.
    pub only_learnings_modified: bool,
    /// The plan file exists at `HEAD` but not at `HEAD~1`.
    pub todo_file_is_new: bool,
    /// Nearest agent-phase marker preceding a human commit.
    pub prev_phase_prefix: Option<Marker>,
}

/// Next action to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Step {
    CommitFeedback,
    Plan,
    Build,
    Learn,
    Cleanup,
    Idle,
    Explore,
}

impl Step {
    pub fn as_str(self) -> &'static str {
        match self {
            Step::CommitFeedback => "commit-feedback",
            Step::Plan => "plan",
            Step::Build => "build",
            Step::Learn => "learn",
            Step::Cleanup => "cleanup",
            Step::Idle => "idle",
            Step::Explore => "explore",
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Decide the next step from an observation record.
pub fn infer_step(obs: &Observation) -> Step {
    // In-progress edits must be committed before any phase can run.
    if obs.has_uncommitted_changes {
        return Step::CommitFeedback;
    }

    match obs.last_commit_prefix {
        Some(Marker::Seed) => Step::Explore,
        Some(Marker::Explore) => Step::Plan,
        Some(Marker::Human | Marker::Feedback) => {
            if obs.only_learnings_modified {
                Step::Learn
            } else {
                match obs.prev_phase_prefix {
                    Some(prev) => resume_after_feedback(prev, obs),
                    None => Step::Plan,
                }
            }
        }
        Some(Marker::Plan) => Step::Build,
        Some(Marker::Build | Marker::Fix) => {
            if obs.todo_file_is_new {
                Step::Plan
            } else {
                build_or_learn(obs)
            }
        }
        Some(Marker::Learn) => Step::Cleanup,
        Some(Marker::Cleanup) | None => {
            if obs.todo_file_is_new {
                Step::Plan
            } else {
                Step::Idle
            }
        }
    }
}

/// Phase to pick up again after human feedback interrupted `prev`.
fn resume_after_feedback(prev: Marker, obs: &Observation) -> Step {
    match prev {
        Marker::Build => build_or_learn(obs),
        Marker::Learn => Step::Learn,
        Marker::Seed => Step::Explore,
        Marker::Plan | Marker::Explore | Marker::Feedback | Marker::Cleanup => Step::Plan,
        // Never produced by the harvester, which skips human-authored markers.
        Marker::Human | Marker::Fix => Step::Plan,
    }
}

fn build_or_learn(obs: &Observation) -> Step {
    if obs.has_unchecked_items {
        Step::Build
    } else {
        Step::Learn
    }
}
