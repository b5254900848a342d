//! Inactivity and forbidden-tool guards around any [`Agent`].

use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::{Mutex, PoisonError};
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, instrument, warn};

use super::{Agent, AgentError, AgentEvent, AgentResult, CancelToken, Invocation, Provider};

/// Upper bound on how long the watchdog sleeps between idle checks.
const MAX_POLL: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GuardConfig {
    /// Zero disables the inactivity watchdog.
    pub inactivity_timeout: Duration,
    /// Tool names that mean the agent is waiting on a human.
    pub forbidden_tools: Vec<String>,
}

impl GuardConfig {
    pub fn is_disabled(&self) -> bool {
        self.inactivity_timeout.is_zero() && self.forbidden_tools.is_empty()
    }
}

/// Wrap `agent` so stalls and forbidden tools fail the invocation.
///
/// Returns `agent` unchanged when both guards are disabled.
pub fn with_agent_guards(agent: Box<dyn Agent>, config: GuardConfig) -> Box<dyn Agent> {
    if config.is_disabled() {
        return agent;
    }
    Box::new(GuardedAgent {
        inner: agent,
        config,
    })
}

struct GuardedAgent {
    inner: Box<dyn Agent>,
    config: GuardConfig,
}

fn latch(slot: &Mutex<Option<AgentError>>, violation: AgentError) {
    let mut slot = slot.lock().unwrap_or_else(PoisonError::into_inner);
    if slot.is_none() {
        warn!(reason = ?violation.guard_reason(), "agent guard tripped");
        *slot = Some(violation);
    }
}

impl Agent for GuardedAgent {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn provider(&self) -> Provider {
        self.inner.provider()
    }

    #[instrument(skip_all, fields(agent = self.inner.name(), timeout_secs = self.config.inactivity_timeout.as_secs()))]
    fn invoke(
        &self,
        invocation: &Invocation,
        on_event: &mut dyn FnMut(AgentEvent),
        cancel: &CancelToken,
    ) -> Result<AgentResult, AgentError> {
        let timeout = self.config.inactivity_timeout;
        let token = cancel.child_token();
        let last_activity = Mutex::new(Instant::now());
        let violation: Mutex<Option<AgentError>> = Mutex::new(None);
        let (done_tx, done_rx) = mpsc::channel::<()>();

        let result = thread::scope(|scope| {
            if !timeout.is_zero() {
                let (token, last_activity, violation) = (&token, &last_activity, &violation);
                scope.spawn(move || {
                    let poll = timeout.min(MAX_POLL);
                    loop {
                        match done_rx.recv_timeout(poll) {
                            Err(RecvTimeoutError::Timeout) => {}
                            Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                        }
                        let idle = last_activity
                            .lock()
                            .unwrap_or_else(PoisonError::into_inner)
                            .elapsed();
                        if idle >= timeout {
                            latch(violation, AgentError::InactivityTimeout { idle });
                            token.cancel();
                            break;
                        }
                    }
                });
            }

            let mut guarded = |event: AgentEvent| {
                *last_activity.lock().unwrap_or_else(PoisonError::into_inner) = Instant::now();
                if let AgentEvent::ToolStart(tool) = &event
                    && self.config.forbidden_tools.iter().any(|f| f == tool)
                {
                    latch(&violation, AgentError::InputRequested { tool: tool.clone() });
                    token.cancel();
                }
                on_event(event);
            };
            let result = self.inner.invoke(invocation, &mut guarded, &token);
            // Wakes the watchdog so the scope can join it.
            let _ = done_tx.send(());
            result
        });

        let tripped = violation
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner);
        match tripped {
            Some(violation) => {
                debug!(inner_ok = result.is_ok(), "guard violation overrides agent result");
                Err(violation)
            }
            None => result,
        }
    }

    fn is_available(&self) -> bool {
        self.inner.is_available()
    }
}
