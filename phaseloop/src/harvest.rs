//! Builds the [`Observation`] the workflow state machine runs on.
//!
//! Every git probe degrades to its default on failure: a young repository
//! (no commits, one commit, no plan yet) is a normal state, not an error.

use std::fs;
use std::path::Path;

use anyhow::Result;
use tracing::{debug, instrument};

use crate::core::learnings::{is_only_learnings_modified, learnings_range};
use crate::core::marker::{Marker, parse_marker};
use crate::core::plan::has_unchecked_items;
use crate::core::workflow::Observation;
use crate::io::git::Git;

/// How many commits before HEAD are searched for the interrupted phase.
pub const PREV_PHASE_SCAN: usize = 20;

#[instrument(skip_all, fields(plan_file = %plan_file.display()))]
pub fn harvest(git: &Git, plan_file: &Path) -> Observation {
    let has_uncommitted_changes = or_default(git.has_uncommitted_changes(), "uncommitted changes");
    let last_commit_prefix = or_default(git.last_commit_subject(), "last commit subject")
        .as_deref()
        .and_then(parse_marker);
    let has_unchecked_items = fs::read_to_string(git.workdir().join(plan_file))
        .map(|plan| has_unchecked_items(&plan))
        .unwrap_or(false);

    let after_human = last_commit_prefix == Some(Marker::Human);
    let only_learnings_modified =
        after_human && or_default(last_commit_only_learnings(git, plan_file), "learnings diff");
    let todo_file_is_new =
        !has_uncommitted_changes && or_default(plan_file_is_new(git, plan_file), "plan file age");
    let prev_phase_prefix = if after_human {
        or_default(previous_phase(git), "previous phase")
    } else {
        None
    };

    let obs = Observation {
        has_uncommitted_changes,
        last_commit_prefix,
        has_unchecked_items,
        only_learnings_modified,
        todo_file_is_new,
        prev_phase_prefix,
    };
    debug!(?obs, "harvested observation");
    obs
}

fn or_default<T: Default>(result: Result<T>, what: &str) -> T {
    result.unwrap_or_else(|err| {
        debug!(what, err = %format!("{err:#}"), "git probe failed, using default");
        T::default()
    })
}

/// HEAD touched only the plan file, and only inside its Learnings section.
fn last_commit_only_learnings(git: &Git, plan_file: &Path) -> Result<bool> {
    let plan = plan_file.to_string_lossy().replace('\\', "/");
    let paths = git.changed_paths("HEAD~1", "HEAD")?;
    if paths.is_empty() || paths.iter().any(|p| *p != plan) {
        return Ok(false);
    }
    let Some(range) = learnings_range(&git.show_file("HEAD~1", plan_file)?) else {
        return Ok(false);
    };
    let diff = git.diff_range("HEAD~1", "HEAD", &[plan_file])?;
    Ok(is_only_learnings_modified(&diff, range))
}

fn plan_file_is_new(git: &Git, plan_file: &Path) -> Result<bool> {
    Ok(git.file_exists_at("HEAD", plan_file)? && !git.file_exists_at("HEAD~1", plan_file)?)
}

/// First agent phase marker among the commits preceding HEAD.
fn previous_phase(git: &Git) -> Result<Option<Marker>> {
    Ok(git
        .recent_subjects(PREV_PHASE_SCAN + 1)?
        .iter()
        .skip(1)
        .filter_map(|subject| parse_marker(subject))
        .find(|marker| !marker.is_human_authored()))
}
