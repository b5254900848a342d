//! Plan phase: write or revise the plan file.

use anyhow::Result;
use tracing::instrument;

use super::{PhaseContext, invoke_agent};
use crate::agent::AgentMode;
use crate::core::marker::Marker;

/// Continue the stored session (if any), save the new id, commit PLAN.
#[instrument(skip_all)]
pub fn run_plan(ctx: &PhaseContext<'_>) -> Result<Vec<String>> {
    let plan_exists = ctx.read_plan()?.is_some();
    let prompt = ctx.prompts.plan(plan_exists)?;
    let turn = invoke_agent(ctx, AgentMode::Plan, prompt, ctx.sessions.load()?)?;
    if let Some(id) = &turn.session_id {
        ctx.sessions.save(id)?;
    }
    Ok(vec![ctx.commit_phase(Marker::Plan)?])
}
