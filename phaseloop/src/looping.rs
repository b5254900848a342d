//! Multi-step looping helper for `phaseloop loop`.

use anyhow::Result;
use tracing::info;

use crate::agent::GuardReason;
use crate::core::workflow::Step;
use crate::phases::PhaseContext;
use crate::step::{StepOutcome, run_step};

/// Reason why `run_loop` stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoopStop {
    /// The workflow has nothing left to do.
    Idle,
    /// A guard stopped the agent mid-phase.
    Interrupted { step: Step, reason: GuardReason },
    /// The configured step limit was reached.
    MaxSteps { max_steps: usize },
    /// The cancel token fired between steps.
    Cancelled,
}

/// Summary of a loop invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoopOutcome {
    /// Steps that ran a phase (idle checks are not counted).
    pub steps_executed: usize,
    pub stop: LoopStop,
}

/// Run steps until idle, a guard interruption, cancellation or `max_steps`.
///
/// Every step that ran a phase is reported to `on_step`. Any step error stops
/// the loop and is returned as-is.
pub fn run_loop<F: FnMut(&StepOutcome)>(
    ctx: &PhaseContext<'_>,
    max_steps: Option<usize>,
    mut on_step: F,
) -> Result<LoopOutcome> {
    let mut steps_executed = 0usize;
    loop {
        if let Some(max_steps) = max_steps
            && steps_executed >= max_steps
        {
            return Ok(LoopOutcome {
                steps_executed,
                stop: LoopStop::MaxSteps { max_steps },
            });
        }
        if ctx.cancel.is_cancelled() {
            return Ok(LoopOutcome {
                steps_executed,
                stop: LoopStop::Cancelled,
            });
        }

        let outcome = run_step(ctx)?;
        match outcome {
            StepOutcome::Idle => {
                info!(steps_executed, "loop reached idle");
                return Ok(LoopOutcome {
                    steps_executed,
                    stop: LoopStop::Idle,
                });
            }
            StepOutcome::Interrupted { step, reason } => {
                steps_executed += 1;
                on_step(&outcome);
                return Ok(LoopOutcome {
                    steps_executed,
                    stop: LoopStop::Interrupted { step, reason },
                });
            }
            StepOutcome::Committed { .. } => {
                steps_executed += 1;
                on_step(&outcome);
            }
        }
    }
}
