//! Single-turn phases that start a fresh agent session: learn, cleanup and
//! explore.

use anyhow::Result;
use tracing::instrument;

use super::{PhaseContext, invoke_agent};
use crate::agent::AgentMode;
use crate::core::marker::Marker;

#[instrument(skip_all)]
pub fn run_learn(ctx: &PhaseContext<'_>) -> Result<Vec<String>> {
    let prompt = ctx.prompts.learn()?;
    fresh_turn(ctx, AgentMode::Learn, prompt, Marker::Learn)
}

#[instrument(skip_all)]
pub fn run_cleanup(ctx: &PhaseContext<'_>) -> Result<Vec<String>> {
    let prompt = ctx.prompts.cleanup()?;
    fresh_turn(ctx, AgentMode::Build, prompt, Marker::Cleanup)
}

#[instrument(skip_all)]
pub fn run_explore(ctx: &PhaseContext<'_>) -> Result<Vec<String>> {
    let prompt = ctx.prompts.explore()?;
    fresh_turn(ctx, AgentMode::Explore, prompt, Marker::Explore)
}

fn fresh_turn(
    ctx: &PhaseContext<'_>,
    mode: AgentMode,
    prompt: String,
    marker: Marker,
) -> Result<Vec<String>> {
    invoke_agent(ctx, mode, prompt, None)?;
    Ok(vec![ctx.commit_phase(marker)?])
}
