//! Phase commands: each runs one agent turn (or a few) and commits the result.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::{debug, info, warn};

use crate::agent::{Agent, AgentEvent, AgentMode, CancelToken, Invocation};
use crate::core::commit_message::commit_subject;
use crate::core::marker::Marker;
use crate::io::config::PhaseloopConfig;
use crate::io::git::Git;
use crate::io::prompt::Prompts;
use crate::io::session::SessionStore;

pub mod build;
pub mod commit_feedback;
pub mod plan;
pub mod reflect;

/// Everything a phase needs, borrowed for the duration of one step.
pub struct PhaseContext<'a> {
    pub git: &'a Git,
    pub agent: &'a dyn Agent,
    pub sessions: &'a dyn SessionStore,
    pub prompts: &'a Prompts,
    pub config: &'a PhaseloopConfig,
    pub cancel: &'a CancelToken,
}

impl PhaseContext<'_> {
    pub fn root(&self) -> &Path {
        self.git.workdir()
    }

    pub fn plan_file(&self) -> &Path {
        &self.config.plan_file
    }

    pub fn plan_path(&self) -> PathBuf {
        self.root().join(self.plan_file())
    }

    /// Plan contents, or `None` when the file does not exist yet.
    pub fn read_plan(&self) -> Result<Option<String>> {
        let path = self.plan_path();
        match fs::read_to_string(&path) {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e).with_context(|| format!("read {}", path.display())),
        }
    }

    /// Commit everything under `marker`, empty or not, and return the subject.
    ///
    /// The summary comes from the agent reading the working tree diff; an
    /// empty diff skips the agent and commits `<glyph> update`.
    pub fn commit_phase(&self, marker: Marker) -> Result<String> {
        let diff = self
            .git
            .diff_working_tree()
            .with_context(|| format!("diff {marker} phase changes"))?;
        let subject = if diff.trim().is_empty() {
            commit_subject(marker, None)
        } else {
            summarize(self, marker, &diff)
        };
        self.git
            .commit_all(&subject, true)
            .with_context(|| format!("commit {marker} phase"))?;
        info!(subject, "committed phase");
        Ok(subject)
    }
}

/// Ask the agent for a subject line; any failure falls back to `<glyph> update`.
pub(crate) fn summarize(ctx: &PhaseContext<'_>, marker: Marker, diff: &str) -> String {
    let raw = ctx
        .prompts
        .commit_message(marker, diff, ctx.config.commit_diff_limit_bytes)
        .and_then(|prompt| invoke_agent(ctx, AgentMode::Commit, prompt, None));
    match raw {
        Ok(turn) => commit_subject(marker, turn.text.as_deref()),
        Err(err) => {
            warn!(marker = marker.as_str(), err = %format!("{err:#}"), "commit message agent failed");
            commit_subject(marker, None)
        }
    }
}

/// Result of one agent turn.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AgentTurn {
    pub session_id: Option<String>,
    /// Final assistant text, or the streamed deltas when no turn text arrived.
    pub text: Option<String>,
}

/// Run one agent turn, logging its events.
///
/// Agent failures come back as [`crate::agent::AgentError`] inside the
/// `anyhow::Error`, so callers can downcast guard trips.
pub fn invoke_agent(
    ctx: &PhaseContext<'_>,
    mode: AgentMode,
    prompt: String,
    resume_session_id: Option<String>,
) -> Result<AgentTurn> {
    let invocation = Invocation {
        prompt,
        system_prompt: ctx.prompts.system()?,
        mode,
        cwd: ctx.root().to_path_buf(),
        resume_session_id,
    };
    info!(
        agent = ctx.agent.name(),
        mode = mode.as_str(),
        resume = invocation.resume_session_id.is_some(),
        "invoking agent"
    );

    let mut last_text: Option<String> = None;
    let mut deltas = String::new();
    let mut on_event = |event: AgentEvent| match event {
        AgentEvent::AgentStart => debug!("agent started"),
        AgentEvent::TurnStart => {
            deltas.clear();
            debug!("turn started");
        }
        AgentEvent::TextDelta(text) => deltas.push_str(&text),
        AgentEvent::TurnEnd(text) => {
            info!(text = first_line(&text), "agent said");
            last_text = Some(text);
        }
        AgentEvent::ToolStart(name) => info!(tool = %name, "tool started"),
        AgentEvent::ToolEnd { name, is_error } => {
            if is_error {
                warn!(tool = %name, "tool failed");
            } else {
                debug!(tool = %name, "tool finished");
            }
        }
        AgentEvent::AgentEnd => debug!("agent finished"),
    };

    let result = ctx.agent.invoke(&invocation, &mut on_event, ctx.cancel)?;
    let text = last_text.or_else(|| (!deltas.trim().is_empty()).then_some(deltas));
    Ok(AgentTurn {
        session_id: result.session_id,
        text,
    })
}

fn first_line(text: &str) -> &str {
    text.lines().map(str::trim).find(|l| !l.is_empty()).unwrap_or_default()
}
