//! Adapter for the `claude` CLI (`-p --output-format stream-json`).

use std::collections::HashMap;
use std::path::PathBuf;
use std::process::Command;
use std::time::Duration;

use serde_json::Value;
use tracing::instrument;

use super::stream::{LineDecoder, json_object, run_ndjson};
use super::{Agent, AgentError, AgentEvent, AgentMode, AgentResult, CancelToken, Invocation, Provider};
use crate::io::process::command_succeeds;

#[derive(Debug, Clone)]
pub struct ClaudeAgent {
    binary: PathBuf,
}

impl ClaudeAgent {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    fn command(&self, invocation: &Invocation) -> Command {
        let mut cmd = Command::new(&self.binary);
        cmd.current_dir(&invocation.cwd);
        cmd.args(build_args(invocation));
        cmd
    }
}

/// CLI flags for one turn; the prompt itself goes to stdin.
pub fn build_args(invocation: &Invocation) -> Vec<String> {
    let mut args: Vec<String> = [
        "-p",
        "--output-format",
        "stream-json",
        "--verbose",
        "--include-partial-messages",
    ]
    .into_iter()
    .map(String::from)
    .collect();

    match invocation.mode {
        AgentMode::Build => args.push("--dangerously-skip-permissions".to_string()),
        AgentMode::Commit => args.extend(["--permission-mode".to_string(), "plan".to_string()]),
        AgentMode::Plan | AgentMode::Learn | AgentMode::Explore => {
            args.extend(["--permission-mode".to_string(), "acceptEdits".to_string()]);
        }
    }

    match &invocation.resume_session_id {
        Some(id) => args.extend(["--resume".to_string(), id.clone()]),
        None if !invocation.system_prompt.trim().is_empty() => {
            args.extend([
                "--append-system-prompt".to_string(),
                invocation.system_prompt.clone(),
            ]);
        }
        None => {}
    }
    args
}

/// Stream-json decoder for one turn.
///
/// Tool starts come from `content_block_start` stream events, one per
/// `tool_use` block. Tool ids are remembered so results report the tool name.
#[derive(Debug, Default)]
pub struct ClaudeDecoder {
    tool_names: HashMap<String, String>,
}

impl ClaudeDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Map one stream-json line to an event.
    pub fn parse_line(&mut self, line: &str) -> Option<AgentEvent> {
        let obj = json_object(line)?;
        match obj.get("type")?.as_str()? {
            "system" if obj.get("subtype").and_then(Value::as_str) == Some("init") => {
                Some(AgentEvent::AgentStart)
            }
            "assistant" => {
                let content = obj.get("message")?.get("content")?.as_array()?;
                for block in content.iter().filter(|b| block_type(b) == Some("tool_use")) {
                    self.remember_tool(block);
                }
                let text: Vec<&str> = content
                    .iter()
                    .filter(|block| block_type(block) == Some("text"))
                    .filter_map(|block| block.get("text").and_then(Value::as_str))
                    .collect();
                (!text.is_empty()).then(|| AgentEvent::TurnEnd(text.join("")))
            }
            "user" => {
                let content = obj.get("message")?.get("content")?.as_array()?;
                let result = content
                    .iter()
                    .find(|block| block_type(block) == Some("tool_result"))?;
                let id = result
                    .get("tool_use_id")
                    .and_then(Value::as_str)
                    .unwrap_or("tool");
                let name = self
                    .tool_names
                    .remove(id)
                    .unwrap_or_else(|| id.to_string());
                Some(AgentEvent::ToolEnd {
                    name,
                    is_error: result
                        .get("is_error")
                        .and_then(Value::as_bool)
                        .unwrap_or(false),
                })
            }
            "stream_event" => {
                let event = obj.get("event")?;
                match event.get("type")?.as_str()? {
                    "message_start" => Some(AgentEvent::TurnStart),
                    "content_block_start" => {
                        let block = event.get("content_block")?;
                        if block_type(block) != Some("tool_use") {
                            return None;
                        }
                        Some(AgentEvent::ToolStart(self.remember_tool(block)))
                    }
                    "content_block_delta" => {
                        let delta = event.get("delta")?;
                        if delta.get("type")?.as_str()? != "text_delta" {
                            return None;
                        }
                        let text = delta.get("text")?.as_str()?;
                        Some(AgentEvent::TextDelta(text.to_string()))
                    }
                    _ => None,
                }
            }
            "result" => Some(AgentEvent::AgentEnd),
            _ => None,
        }
    }

    fn remember_tool(&mut self, block: &Value) -> String {
        let name = block
            .get("name")
            .and_then(Value::as_str)
            .unwrap_or("tool")
            .to_string();
        if let Some(id) = block.get("id").and_then(Value::as_str) {
            self.tool_names.insert(id.to_string(), name.clone());
        }
        name
    }
}

impl LineDecoder for ClaudeDecoder {
    fn parse_line(&mut self, line: &str) -> Option<AgentEvent> {
        ClaudeDecoder::parse_line(self, line)
    }

    fn extract_session_id(&self, line: &str) -> Option<String> {
        extract_session_id(line)
    }
}

fn block_type(block: &Value) -> Option<&str> {
    block.get("type").and_then(Value::as_str)
}

/// Session id from the terminal `result` event.
pub fn extract_session_id(line: &str) -> Option<String> {
    let obj = json_object(line)?;
    if obj.get("type")?.as_str()? != "result" {
        return None;
    }
    obj.get("session_id")?
        .as_str()
        .filter(|id| !id.is_empty())
        .map(str::to_string)
}

impl Agent for ClaudeAgent {
    fn name(&self) -> &str {
        Provider::Claude.as_str()
    }

    fn provider(&self) -> Provider {
        Provider::Claude
    }

    #[instrument(skip_all, fields(agent = "claude", mode = invocation.mode.as_str(), resume = invocation.resume_session_id.is_some()))]
    fn invoke(
        &self,
        invocation: &Invocation,
        on_event: &mut dyn FnMut(AgentEvent),
        cancel: &CancelToken,
    ) -> Result<AgentResult, AgentError> {
        run_ndjson(
            self.name(),
            self.command(invocation),
            invocation.prompt.clone(),
            &mut ClaudeDecoder::new(),
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

    fn invocation(mode: AgentMode, resume: Option<&str>) -> Invocation {
        Invocation {
            prompt: "go".to_string(),
            system_prompt: "SYSTEM".to_string(),
            mode,
            cwd: PathBuf::from("."),
            resume_session_id: resume.map(str::to_string),
        }
    }

    #[test]
    fn system_prompt_only_on_first_turn() {
        let first = build_args(&invocation(AgentMode::Plan, None));
        assert!(first.windows(2).any(|w| w == ["--append-system-prompt", "SYSTEM"]));
        assert!(!first.contains(&"--resume".to_string()));

        let resumed = build_args(&invocation(AgentMode::Plan, Some("s-1")));
        assert!(resumed.windows(2).any(|w| w == ["--resume", "s-1"]));
        assert!(!resumed.contains(&"--append-system-prompt".to_string()));
    }

    #[test]
    fn commit_mode_is_read_only() {
        let args = build_args(&invocation(AgentMode::Commit, None));
        assert!(args.windows(2).any(|w| w == ["--permission-mode", "plan"]));
        let args = build_args(&invocation(AgentMode::Build, None));
        assert!(args.contains(&"--dangerously-skip-permissions".to_string()));
    }

    #[test]
    fn parses_stream_json_events() {
        let cases = [
            (
                r#"{"type":"system","subtype":"init","session_id":"s"}"#,
                Some(AgentEvent::AgentStart),
            ),
            (
                r#"{"type":"stream_event","event":{"type":"message_start","message":{}}}"#,
                Some(AgentEvent::TurnStart),
            ),
            (
                r#"{"type":"stream_event","event":{"type":"content_block_delta","index":0,"delta":{"type":"text_delta","text":"Hel"}}}"#,
                Some(AgentEvent::TextDelta("Hel".to_string())),
            ),
            (
                r#"{"type":"stream_event","event":{"type":"content_block_delta","index":1,"delta":{"type":"input_json_delta","partial_json":"{"}}}"#,
                None,
            ),
            (
                r#"{"type":"assistant","message":{"content":[{"type":"text","text":"Hello"}]}}"#,
                Some(AgentEvent::TurnEnd("Hello".to_string())),
            ),
            (
                r#"{"type":"stream_event","event":{"type":"content_block_start","index":1,"content_block":{"type":"tool_use","id":"t1","name":"Bash","input":{}}}}"#,
                Some(AgentEvent::ToolStart("Bash".to_string())),
            ),
            (
                r#"{"type":"stream_event","event":{"type":"content_block_start","index":0,"content_block":{"type":"text","text":""}}}"#,
                None,
            ),
            (
                r#"{"type":"assistant","message":{"content":[{"type":"tool_use","id":"t1","name":"Bash","input":{}}]}}"#,
                None,
            ),
            (
                r#"{"type":"user","message":{"content":[{"type":"tool_result","tool_use_id":"t1","is_error":true}]}}"#,
                Some(AgentEvent::ToolEnd {
                    name: "Bash".to_string(),
                    is_error: true,
                }),
            ),
            (
                r#"{"type":"result","subtype":"success","session_id":"abc-123","result":"done"}"#,
                Some(AgentEvent::AgentEnd),
            ),
        ];
        let mut decoder = ClaudeDecoder::new();
        for (line, expected) in cases {
            assert_eq!(decoder.parse_line(line), expected, "line: {line}");
        }
    }

    #[test]
    fn every_tool_block_in_a_message_starts_a_tool() {
        let lines = [
            r#"{"type":"stream_event","event":{"type":"message_start","message":{}}}"#,
            r#"{"type":"stream_event","event":{"type":"content_block_start","index":0,"content_block":{"type":"tool_use","id":"t1","name":"Read","input":{}}}}"#,
            r#"{"type":"stream_event","event":{"type":"content_block_start","index":1,"content_block":{"type":"tool_use","id":"t2","name":"AskUserQuestion","input":{}}}}"#,
            r#"{"type":"assistant","message":{"content":[{"type":"tool_use","id":"t1","name":"Read","input":{}},{"type":"tool_use","id":"t2","name":"AskUserQuestion","input":{}}]}}"#,
        ];
        let mut decoder = ClaudeDecoder::new();
        let events: Vec<AgentEvent> = lines
            .iter()
            .filter_map(|line| decoder.parse_line(line))
            .collect();
        assert_eq!(
            events,
            vec![
                AgentEvent::TurnStart,
                AgentEvent::ToolStart("Read".to_string()),
                AgentEvent::ToolStart("AskUserQuestion".to_string()),
            ]
        );
    }

    #[test]
    fn tool_results_report_the_tool_name() {
        let mut decoder = ClaudeDecoder::new();
        decoder.parse_line(
            r#"{"type":"assistant","message":{"content":[{"type":"tool_use","id":"toolu_9","name":"Edit","input":{}}]}}"#,
        );
        assert_eq!(
            decoder.parse_line(
                r#"{"type":"user","message":{"content":[{"type":"tool_result","tool_use_id":"toolu_9"}]}}"#
            ),
            Some(AgentEvent::ToolEnd {
                name: "Edit".to_string(),
                is_error: false,
            })
        );
        // Unknown ids are passed through.
        assert_eq!(
            decoder.parse_line(
                r#"{"type":"user","message":{"content":[{"type":"tool_result","tool_use_id":"toolu_9"}]}}"#
            ),
            Some(AgentEvent::ToolEnd {
                name: "toolu_9".to_string(),
                is_error: false,
            })
        );
    }

    #[test]
    fn unknown_and_malformed_lines_are_ignored() {
        let mut decoder = ClaudeDecoder::new();
        assert_eq!(decoder.parse_line("not json"), None);
        assert_eq!(decoder.parse_line(r#"{"type":"rate_limit"}"#), None);
        assert_eq!(decoder.parse_line(r#"{"no_type":true}"#), None);
        assert_eq!(decoder.parse_line(r#"{"type":"system","subtype":"compact"}"#), None);
    }

    #[test]
    fn session_id_comes_from_result_only() {
        assert_eq!(
            extract_session_id(r#"{"type":"result","session_id":"abc-123"}"#),
            Some("abc-123".to_string())
        );
        assert_eq!(
            extract_session_id(r#"{"type":"system","subtype":"init","session_id":"early"}"#),
            None
        );
        assert_eq!(extract_session_id(r#"{"type":"result","session_id":""}"#), None);
        assert_eq!(extract_session_id("garbage"), None);
    }
}
