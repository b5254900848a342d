//! Provider selection: explicit lookup or `auto` with sequential fallback.

use std::path::PathBuf;

use tracing::{info, instrument, warn};

use super::{Agent, AgentError, AgentEvent, AgentResult, CancelToken, Invocation, Provider, create_agent};

/// Provider name that probes every known CLI.
pub const AUTO: &str = "auto";

/// Build the agent for `requested` (`auto` or a provider name).
///
/// `binary_for` maps each provider to the executable to run.
pub fn resolve_agent(
    requested: &str,
    binary_for: impl Fn(Provider) -> PathBuf,
) -> Result<Box<dyn Agent>, AgentError> {
    let candidates = Provider::ALL
        .into_iter()
        .map(|provider| create_agent(provider, binary_for(provider)))
        .collect();
    resolve_from(candidates, requested)
}

/// Resolve against an explicit candidate list, kept in probe order.
#[instrument(skip(candidates))]
pub fn resolve_from(
    candidates: Vec<Box<dyn Agent>>,
    requested: &str,
) -> Result<Box<dyn Agent>, AgentError> {
    if requested.trim().eq_ignore_ascii_case(AUTO) {
        let tried = candidates
            .iter()
            .map(|agent| agent.name().to_string())
            .collect::<Vec<_>>()
            .join(", ");
        let available: Vec<Box<dyn Agent>> = candidates
            .into_iter()
            .filter(|agent| {
                let ok = agent.is_available();
                if !ok {
                    info!(agent = agent.name(), "agent not available");
                }
                ok
            })
            .collect();
        return FallbackAgent::new(available)
            .map(|agent| Box::new(agent) as Box<dyn Agent>)
            .ok_or(AgentError::NoProviderAvailable { tried });
    }

    let provider: Provider = requested.parse()?;
    candidates
        .into_iter()
        .find(|agent| agent.provider() == provider)
        .ok_or_else(|| AgentError::UnknownProvider(requested.to_string()))
}

/// Tries each agent in order until one succeeds.
pub struct FallbackAgent {
    name: String,
    agents: Vec<Box<dyn Agent>>,
}

impl FallbackAgent {
    /// `None` when `agents` is empty.
    pub fn new(agents: Vec<Box<dyn Agent>>) -> Option<Self> {
        let first = agents.first()?;
        Some(Self {
            name: format!("{} (auto)", first.name()),
            agents,
        })
    }
}

impl Agent for FallbackAgent {
    fn name(&self) -> &str {
        &self.name
    }

    fn provider(&self) -> Provider {
        self.agents
            .first()
            .map_or(Provider::Claude, |agent| agent.provider())
    }

    fn invoke(
        &self,
        invocation: &Invocation,
        on_event: &mut dyn FnMut(AgentEvent),
        cancel: &CancelToken,
    ) -> Result<AgentResult, AgentError> {
        let mut last_err = None;
        for agent in &self.agents {
            match agent.invoke(invocation, on_event, cancel) {
                Ok(result) => return Ok(result),
                Err(err) => {
                    if cancel.is_cancelled() || matches!(err, AgentError::Cancelled { .. }) {
                        return Err(err);
                    }
                    warn!(agent = agent.name(), err = %err, "agent failed, trying next provider");
                    last_err = Some(err);
                }
            }
        }
        Err(last_err.unwrap_or(AgentError::NoProviderAvailable {
            tried: String::new(),
        }))
    }

    fn is_available(&self) -> bool {
        self.agents.iter().any(|agent| agent.is_available())
    }
}
