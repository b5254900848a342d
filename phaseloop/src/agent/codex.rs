//! Adapter for `codex exec --json`.

use std::path::PathBuf;
use std::process::Command;
use std::time::Duration;

use serde_json::Value;
use tracing::instrument;

use super::stream::{StatelessDecoder, json_object, run_ndjson};
use super::{Agent, AgentError, AgentEvent, AgentMode, AgentResult, CancelToken, Invocation, Provider};
use crate::io::process::command_succeeds;

#[derive(Debug, Clone)]
pub struct CodexAgent {
    binary: PathBuf,
}

impl CodexAgent {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }
}

pub fn build_args(invocation: &Invocation) -> Vec<String> {
    let sandbox = match invocation.mode {
        AgentMode::Commit => "read-only",
        AgentMode::Plan | AgentMode::Build | AgentMode::Learn | AgentMode::Explore => {
            "workspace-write"
        }
    };
    ["exec", "--json", "--skip-git-repo-check", "--sandbox", sandbox, "-"]
        .into_iter()
        .map(String::from)
        .collect()
}

/// Tool label for a codex item, when the item is a tool call.
fn tool_name(item: &Value) -> Option<String> {
    match item.get("type")?.as_str()? {
        "command_execution" => Some("shell".to_string()),
        "mcp_tool_call" => {
            let tool = item.get("tool").and_then(Value::as_str).unwrap_or("tool");
            Some(match item.get("server").and_then(Value::as_str) {
                Some(server) => format!("{server}.{tool}"),
                None => tool.to_string(),
            })
        }
        "web_search" => Some("web_search".to_string()),
        _ => None,
    }
}

fn item_failed(item: &Value) -> bool {
    let status_failed = item.get("status").and_then(Value::as_str) == Some("failed");
    let nonzero_exit = item
        .get("exit_code")
        .and_then(Value::as_i64)
        .is_some_and(|code| code != 0);
    status_failed || nonzero_exit
}

pub fn parse_line(line: &str) -> Option<AgentEvent> {
    let obj = json_object(line)?;
    match obj.get("type")?.as_str()? {
        "thread.started" => Some(AgentEvent::AgentStart),
        "turn.started" => Some(AgentEvent::TurnStart),
        "item.started" => tool_name(obj.get("item")?).map(AgentEvent::ToolStart),
        "item.completed" => {
            let item = obj.get("item")?;
            if item.get("type")?.as_str()? == "agent_message" {
                let text = item.get("text").and_then(Value::as_str).unwrap_or_default();
                return Some(AgentEvent::TurnEnd(text.to_string()));
            }
            let name = tool_name(item)?;
            Some(AgentEvent::ToolEnd {
                name,
                is_error: item_failed(item),
            })
        }
        "turn.completed" => Some(AgentEvent::AgentEnd),
        _ => None,
    }
}

/// Codex threads are not resumed.
pub fn extract_session_id(_line: &str) -> Option<String> {
    None
}

impl Agent for CodexAgent {
    fn name(&self) -> &str {
        Provider::Codex.as_str()
    }

    fn provider(&self) -> Provider {
        Provider::Codex
    }

    #[instrument(skip_all, fields(agent = "codex", mode = invocation.mode.as_str()))]
    fn invoke(
        &self,
        invocation: &Invocation,
        on_event: &mut dyn FnMut(AgentEvent),
        cancel: &CancelToken,
    ) -> Result<AgentResult, AgentError> {
        let mut cmd = Command::new(&self.binary);
        cmd.current_dir(&invocation.cwd).args(build_args(invocation));
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
    fn maps_thread_and_turn_lifecycle() {
        assert_eq!(
            parse_line(r#"{"type":"thread.started","thread_id":"t"}"#),
            Some(AgentEvent::AgentStart)
        );
        assert_eq!(
            parse_line(r#"{"type":"turn.started"}"#),
            Some(AgentEvent::TurnStart)
        );
        assert_eq!(
            parse_line(r#"{"type":"turn.completed","usage":{"input_tokens":1}}"#),
            Some(AgentEvent::AgentEnd)
        );
    }

    #[test]
    fn maps_items() {
        assert_eq!(
            parse_line(
                r#"{"type":"item.started","item":{"id":"i1","type":"command_execution","command":"ls","status":"in_progress"}}"#
            ),
            Some(AgentEvent::ToolStart("shell".to_string()))
        );
        assert_eq!(
            parse_line(
                r#"{"type":"item.completed","item":{"id":"i1","type":"command_execution","exit_code":1,"status":"completed"}}"#
            ),
            Some(AgentEvent::ToolEnd {
                name: "shell".to_string(),
                is_error: true
            })
        );
        assert_eq!(
            parse_line(
                r#"{"type":"item.started","item":{"type":"mcp_tool_call","server":"docs","tool":"search"}}"#
            ),
            Some(AgentEvent::ToolStart("docs.search".to_string()))
        );
        assert_eq!(
            parse_line(
                r#"{"type":"item.completed","item":{"id":"i2","type":"agent_message","text":"All done"}}"#
            ),
            Some(AgentEvent::TurnEnd("All done".to_string()))
        );
        assert_eq!(
            parse_line(r#"{"type":"item.completed","item":{"type":"reasoning","text":"hmm"}}"#),
            None
        );
    }

    #[test]
    fn never_reports_a_session() {
        assert_eq!(
            extract_session_id(r#"{"type":"thread.started","thread_id":"t"}"#),
            None
        );
    }

    #[test]
    fn commit_mode_uses_read_only_sandbox() {
        let mut inv = Invocation {
            prompt: String::new(),
            system_prompt: String::new(),
            mode: AgentMode::Commit,
            cwd: PathBuf::from("."),
            resume_session_id: None,
        };
        assert!(build_args(&inv).windows(2).any(|w| w == ["--sandbox", "read-only"]));
        inv.mode = AgentMode::Build;
        assert!(
            build_args(&inv)
                .windows(2)
                .any(|w| w == ["--sandbox", "workspace-write"])
        );
        assert_eq!(build_args(&inv).last().map(String::as_str), Some("-"));
    }
}
