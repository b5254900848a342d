//! Orchestration for a single `phaseloop step`: harvest, infer, dispatch.

use anyhow::Result;
use tracing::{info, instrument};

use crate::agent::{AgentError, GuardReason};
use crate::core::workflow::{Step, infer_step};
use crate::harvest::harvest;
use crate::logging::notice;
use crate::phases::PhaseContext;
use crate::phases::build::run_build;
use crate::phases::commit_feedback::run_commit_feedback;
use crate::phases::plan::run_plan;
use crate::phases::reflect::{run_cleanup, run_explore, run_learn};

/// Result of a single step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    /// The phase ran and recorded these commit subjects, oldest first.
    Committed { step: Step, commits: Vec<String> },
    /// Nothing to do.
    Idle,
    /// A guard stopped the agent; nothing was committed.
    Interrupted { step: Step, reason: GuardReason },
}

impl StepOutcome {
    pub fn step(&self) -> Step {
        match self {
            StepOutcome::Committed { step, .. } | StepOutcome::Interrupted { step, .. } => *step,
            StepOutcome::Idle => Step::Idle,
        }
    }
}

/// Run the step the repository state calls for.
///
/// Guard trips are reported and returned as [`StepOutcome::Interrupted`];
/// every other failure is an error.
#[instrument(skip_all)]
pub fn run_step(ctx: &PhaseContext<'_>) -> Result<StepOutcome> {
    let obs = harvest(ctx.git, ctx.plan_file());
    let step = infer_step(&obs);
    info!(%step, ?obs, "inferred step");

    let result = match step {
        Step::Idle => {
            notice("nothing to do");
            return Ok(StepOutcome::Idle);
        }
        Step::CommitFeedback => run_commit_feedback(ctx),
        Step::Plan => run_plan(ctx),
        Step::Build => run_build(ctx),
        Step::Learn => run_learn(ctx),
        Step::Cleanup => run_cleanup(ctx),
        Step::Explore => run_explore(ctx),
    };

    match result {
        Ok(commits) => {
            for subject in &commits {
                notice(&format!("{step}: {subject}"));
            }
            Ok(StepOutcome::Committed { step, commits })
        }
        Err(err) => {
            let guard = err
                .downcast_ref::<AgentError>()
                .and_then(AgentError::guard_reason);
            match guard {
                Some(reason) => {
                    notice(&format!("{step} interrupted ({reason}): {err}"));
                    Ok(StepOutcome::Interrupted { step, reason })
                }
                None => Err(err.context(format!("{step} step failed"))),
            }
        }
    }
}
