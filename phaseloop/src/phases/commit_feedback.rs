//! Commit-feedback phase: split uncommitted work into one commit per
//! [`ChangeKind`].
//!
//! Kinds are committed lowest priority first, so the most significant marker
//! ends up on HEAD where the workflow state machine reads it. Changes that
//! cannot be expressed as text hunks (binary files, mode-only changes) or
//! whose patch fails to apply are swept into one final commit.

use anyhow::Result;
use tracing::{info, instrument, warn};

use super::{PhaseContext, summarize};
use crate::core::classifier::{ChangeKind, classify_diff, classify_prefix};
use crate::core::commit_message::commit_subject;

#[instrument(skip_all)]
pub fn run_commit_feedback(ctx: &PhaseContext<'_>) -> Result<Vec<String>> {
    let diff = ctx.git.diff_working_tree()?;
    let classified = classify_diff(&diff, ctx.plan_file());
    info!(kinds = ?classified.kinds(), "classified working tree changes");

    let mut commits = Vec::new();
    for kind in ChangeKind::PRIORITY.into_iter().rev() {
        let Some(patch) = classified.patch(kind) else {
            continue;
        };
        let subject = summarize(ctx, kind.marker(), &patch);
        match ctx.git.commit_patch(&patch, &subject) {
            Ok(()) => commits.push(subject),
            Err(err) => warn!(
                kind = kind.as_str(),
                err = %format!("{err:#}"),
                "patch did not apply; leaving it for the final sweep"
            ),
        }
    }

    if ctx.git.has_uncommitted_changes()? {
        let marker = classify_prefix(&diff, ctx.plan_file());
        let subject = commit_subject(marker, None);
        ctx.git.commit_all(&subject, false)?;
        info!(subject, "committed remaining changes");
        commits.push(subject);
    }
    Ok(commits)
}
