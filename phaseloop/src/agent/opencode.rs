//! Adapter for `opencode run --format json`.

use std::path::PathBuf;
use std::process::Command;
use std::time::Duration;

use serde_json::Value;
use tracing::instrument;

use super::stream::{StatelessDecoder, json_object, run_ndjson};
use super::{Agent, AgentError, AgentEvent, AgentResult, CancelToken, Invocation, Provider};
use crate::io::process::command_succeeds;

#[derive(Debug, Clone)]
pub struct OpencodeAgent {
    binary: PathBuf,
}

impl OpencodeAgent {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }
}

pub fn parse_line(line: &str) -> Option<AgentEvent> {
    let obj = json_object(line)?;
    let part = obj.get("part");
    match obj.get("type")?.as_str()? {
        "step_start" => Some(AgentEvent::TurnStart),
        "text" => {
            let text = part?.get("text")?.as_str()?;
            Some(AgentEvent::TurnEnd(text.to_string()))
        }
        "tool_use" => {
            let part = part?;
            let name = part
                .get("tool")
                .and_then(Value::as_str)
                .unwrap_or("tool")
                .to_string();
            let status = part
                .get("state")
                .and_then(|state| state.get("status"))
                .and_then(Value::as_str)?;
            match status {
                "pending" | "running" => Some(AgentEvent::ToolStart(name)),
                "completed" => Some(AgentEvent::ToolEnd {
                    name,
                    is_error: false,
                }),
                "error" => Some(AgentEvent::ToolEnd {
                    name,
                    is_error: true,
                }),
                _ => None,
            }
        }
        "step_finish" => Some(AgentEvent::AgentEnd),
        _ => None,
    }
}

/// Opencode sessions are not resumed.
pub fn extract_session_id(_line: &str) -> Option<String> {
    None
}

impl Agent for OpencodeAgent {
    fn name(&self) -> &str {
        Provider::Opencode.as_str()
    }

    fn provider(&self) -> Provider {
        Provider::Opencode
    }

    #[instrument(skip_all, fields(agent = "opencode", mode = invocation.mode.as_str()))]
    fn invoke(
        &self,
        invocation: &Invocation,
        on_event: &mut dyn FnMut(AgentEvent),
        cancel: &CancelToken,
    ) -> Result<AgentResult, AgentError> {
        let mut cmd = Command::new(&self.binary);
        cmd.current_dir(&invocation.cwd)
            .args(["run", "--format", "json"]);
        run_ndjson(
            self.name(),
            cmd,
            invocation.inline_prompt(),
            &mut StatelessDecoder {
                parse_line,
                extract_session_id,
            },
            on_event,
            cancel,
        )
    }

    fn is_available(&self) -> bool {
        command_succeeds(&self.binary, Duration::from_secs(10))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_step_and_text_parts() {
        assert_eq!(
            parse_line(r#"{"type":"step_start","sessionID":"ses_1","part":{}}"#),
            Some(AgentEvent::TurnStart)
        );
        assert_eq!(
            parse_line(r#"{"type":"text","part":{"type":"text","text":"patched"}}"#),
            Some(AgentEvent::TurnEnd("patched".to_string()))
        );
        assert_eq!(
            parse_line(r#"{"type":"step_finish","part":{"reason":"stop"}}"#),
            Some(AgentEvent::AgentEnd)
        );
    }

    #[test]
    fn maps_tool_states() {
        let line = |status: &str| {
            format!(r#"{{"type":"tool_use","part":{{"tool":"bash","state":{{"status":"{status}"}}}}}}"#)
        };
        assert_eq!(
            parse_line(&line("running")),
            Some(AgentEvent::ToolStart("bash".to_string()))
        );
        assert_eq!(
            parse_line(&line("completed")),
            Some(AgentEvent::ToolEnd {
                name: "bash".to_string(),
                is_error: false
            })
        );
        assert_eq!(
            parse_line(&line("error")),
            Some(AgentEvent::ToolEnd {
                name: "bash".to_string(),
                is_error: true
            })
        );
        assert_eq!(parse_line(&line("weird")), None);
    }

    #[test]
    fn ignores_noise() {
        assert_eq!(parse_line(""), None);
        assert_eq!(parse_line(r#"{"type":"error","error":"x"}"#), None);
        assert_eq!(extract_session_id(r#"{"sessionID":"ses_1"}"#), None);
    }
}
