//! Agent invocation protocol.
//!
//! The [`Agent`] trait decouples phases from the concrete coding agent. Each
//! provider adapter turns its CLI's line-delimited JSON into the shared
//! [`AgentEvent`] algebra; [`guard`] and [`resolve`] compose adapters into the
//! agent a phase actually talks to. Tests use scripted agents that emit
//! predetermined events without spawning processes.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use serde::{Deserialize, Serialize};

pub mod claude;
pub mod codex;
pub mod guard;
pub mod opencode;
pub mod resolve;
mod stream;

/// What the agent is being asked to do; adapters map this to permissions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentMode {
    Plan,
    Build,
    Learn,
    Commit,
    Explore,
}

impl AgentMode {
    pub fn as_str(self) -> &'static str {
        match self {
            AgentMode::Plan => "plan",
            AgentMode::Build => "build",
            AgentMode::Learn => "learn",
            AgentMode::Commit => "commit",
            AgentMode::Explore => "explore",
        }
    }
}

/// Parameters for one agent turn.
#[derive(Debug, Clone)]
pub struct Invocation {
    pub prompt: String,
    /// Sent only when starting a new session.
    pub system_prompt: String,
    pub mode: AgentMode,
    pub cwd: PathBuf,
    pub resume_session_id: Option<String>,
}

impl Invocation {
    /// Prompt with the system prompt prepended, for agents without a
    /// system-prompt flag. Such agents never resume, so every turn is a
    /// first turn.
    pub fn inline_prompt(&self) -> String {
        if self.system_prompt.trim().is_empty() {
            return self.prompt.clone();
        }
        format!("{}\n\n{}", self.system_prompt.trim_end(), self.prompt)
    }
}

/// Outcome of a successful turn.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AgentResult {
    /// Resumable session, when the provider reports one.
    pub session_id: Option<String>,
}

/// Provider-neutral stream event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AgentEvent {
    AgentStart,
    TurnStart,
    TextDelta(String),
    TurnEnd(String),
    /// One per tool call, carrying the tool name.
    ToolStart(String),
    /// `name` falls back to the provider's call id when the start was not seen.
    ToolEnd { name: String, is_error: bool },
    AgentEnd,
}

/// Known agent CLIs, in `auto` probing order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Claude,
    Codex,
    Opencode,
}

impl Provider {
    pub const ALL: [Provider; 3] = [Provider::Claude, Provider::Codex, Provider::Opencode];

    pub fn as_str(self) -> &'static str {
        match self {
            Provider::Claude => "claude",
            Provider::Codex => "codex",
            Provider::Opencode => "opencode",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Provider {
    type Err = AgentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Provider::ALL
            .into_iter()
            .find(|p| p.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| AgentError::UnknownProvider(s.to_string()))
    }
}

/// Why a guard stopped an invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardReason {
    InactivityTimeout,
    InputRequested,
}

impl GuardReason {
    pub fn as_str(self) -> &'static str {
        match self {
            GuardReason::InactivityTimeout => "inactivity_timeout",
            GuardReason::InputRequested => "input_requested",
        }
    }
}

impl fmt::Display for GuardReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    #[error("failed to start {agent}: {source}")]
    Spawn {
        agent: String,
        #[source]
        source: std::io::Error,
    },
    #[error("{agent} exited with status {}", code.map_or_else(|| "signal".to_string(), |c| c.to_string()))]
    Exit { agent: String, code: Option<i32> },
    #[error("{agent} stream failed: {source}")]
    Stream {
        agent: String,
        #[source]
        source: std::io::Error,
    },
    #[error("{agent} was cancelled")]
    Cancelled { agent: String },
    #[error("agent produced no events for {}s", idle.as_secs())]
    InactivityTimeout { idle: Duration },
    #[error("agent asked for user input via `{tool}`")]
    InputRequested { tool: String },
    #[error("unknown agent provider `{0}` (expected auto, claude, codex or opencode)")]
    UnknownProvider(String),
    #[error("no agent provider available (tried {tried})")]
    NoProviderAvailable { tried: String },
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl AgentError {
    /// Guard reason for the two expected, non-fatal failures.
    pub fn guard_reason(&self) -> Option<GuardReason> {
        match self {
            AgentError::InactivityTimeout { .. } => Some(GuardReason::InactivityTimeout),
            AgentError::InputRequested { .. } => Some(GuardReason::InputRequested),
            _ => None,
        }
    }
}

/// Cooperative cancellation flag shared between an invocation and its guard.
///
/// A child token is cancelled when either it or any ancestor is cancelled.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
    parent: Option<Box<CancelToken>>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn child_token(&self) -> CancelToken {
        CancelToken {
            flag: Arc::new(AtomicBool::new(false)),
            parent: Some(Box::new(self.clone())),
        }
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
            || self.parent.as_ref().is_some_and(|parent| parent.is_cancelled())
    }
}

/// Uniform interface over agent CLIs.
pub trait Agent: Send + Sync {
    /// Display name used in logs and commit diagnostics.
    fn name(&self) -> &str;

    /// Provider backing this agent (first provider for composites).
    fn provider(&self) -> Provider;

    /// Run one turn. Events are delivered in stream order on the calling
    /// thread; delivered events are never retracted on failure.
    fn invoke(
        &self,
        invocation: &Invocation,
        on_event: &mut dyn FnMut(AgentEvent),
        cancel: &CancelToken,
    ) -> Result<AgentResult, AgentError>;

    /// Whether the backing CLI can be run on this machine.
    fn is_available(&self) -> bool;
}

impl<A: Agent + ?Sized> Agent for Box<A> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn provider(&self) -> Provider {
        (**self).provider()
    }

    fn invoke(
        &self,
        invocation: &Invocation,
        on_event: &mut dyn FnMut(AgentEvent),
        cancel: &CancelToken,
    ) -> Result<AgentResult, AgentError> {
        (**self).invoke(invocation, on_event, cancel)
    }

    fn is_available(&self) -> bool {
        (**self).is_available()
    }
}

/// Build the adapter for `provider` using `binary` as its executable.
pub fn create_agent(provider: Provider, binary: impl Into<PathBuf>) -> Box<dyn Agent> {
    match provider {
        Provider::Claude => Box::new(claude::ClaudeAgent::new(binary)),
        Provider::Codex => Box::new(codex::CodexAgent::new(binary)),
        Provider::Opencode => Box::new(opencode::OpencodeAgent::new(binary)),
    }
}
