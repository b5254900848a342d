//! Build phase: work the next unchecked package until it is done or the
//! attempt budget runs out.

use anyhow::Result;
use tracing::{info, instrument, warn};

use super::{PhaseContext, invoke_agent};
use crate::agent::AgentMode;
use crate::core::marker::Marker;
use crate::core::plan::{has_unchecked_items, next_unchecked_package, package_is_complete, parse_packages};
use crate::logging::notice;

#[instrument(skip_all)]
pub fn run_build(ctx: &PhaseContext<'_>) -> Result<Vec<String>> {
    let plan = ctx.read_plan()?.unwrap_or_default();
    let Some(package) = next_unchecked_package(&parse_packages(&plan)) else {
        // Still commit so the marker moves on to learn.
        info!("no unchecked items left to build");
        ctx.sessions.clear()?;
        return Ok(vec![ctx.commit_phase(Marker::Build)?]);
    };

    let max_attempts = ctx.config.max_build_attempts;
    let mut resume = ctx.sessions.load()?;
    let mut complete = false;
    for attempt in 1..=max_attempts {
        info!(package = %package.name, attempt, max_attempts, "building package");
        let prompt = ctx.prompts.build(&package, attempt, max_attempts)?;
        let turn = invoke_agent(ctx, AgentMode::Build, prompt, resume.take())?;
        if let Some(id) = turn.session_id {
            ctx.sessions.save(&id)?;
            resume = Some(id);
        }
        let plan = ctx.read_plan()?.unwrap_or_default();
        if package_is_complete(&plan, &package.name) {
            complete = true;
            break;
        }
    }

    if !complete {
        warn!(package = %package.name, max_attempts, "package still has unchecked items");
        notice(&format!(
            "package `{}` still has unchecked items after {max_attempts} attempt(s)",
            package.name
        ));
    }

    let plan = ctx.read_plan()?.unwrap_or_default();
    if !has_unchecked_items(&plan) {
        ctx.sessions.clear()?;
    }
    Ok(vec![ctx.commit_phase(Marker::Build)?])
}
