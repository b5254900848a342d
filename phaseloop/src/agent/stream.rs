//! Shared driver for agents that speak newline-delimited JSON on stdout.

use std::process::Command;

use tracing::{debug, trace};

use super::{AgentError, AgentEvent, AgentResult, CancelToken};
use crate::io::process::{StreamEnd, StreamError, stream_lines};

/// Per-provider line decoding. One stdout line yields at most one event.
pub(crate) trait LineDecoder {
    fn parse_line(&mut self, line: &str) -> Option<AgentEvent>;
    fn extract_session_id(&self, line: &str) -> Option<String>;
}

/// Decoder for providers whose lines can be read independently.
pub(crate) struct StatelessDecoder {
    pub parse_line: fn(&str) -> Option<AgentEvent>,
    pub extract_session_id: fn(&str) -> Option<String>,
}

impl LineDecoder for StatelessDecoder {
    fn parse_line(&mut self, line: &str) -> Option<AgentEvent> {
        (self.parse_line)(line)
    }

    fn extract_session_id(&self, line: &str) -> Option<String> {
        (self.extract_session_id)(line)
    }
}

/// Spawn `cmd` with `prompt` on stdin and translate its stdout into events.
pub(crate) fn run_ndjson(
    agent: &str,
    cmd: Command,
    prompt: String,
    decoder: &mut dyn LineDecoder,
    on_event: &mut dyn FnMut(AgentEvent),
    cancel: &CancelToken,
) -> Result<AgentResult, AgentError> {
    let mut session_id = None;
    let mut on_line = |line: &str| {
        let line = line.trim();
        if line.is_empty() {
            return;
        }
        if let Some(id) = decoder.extract_session_id(line) {
            session_id = Some(id);
        }
        match decoder.parse_line(line) {
            Some(event) => on_event(event),
            None => trace!(line, "ignored agent line"),
        }
    };

    let end = stream_lines(cmd, Some(prompt), cancel, &mut on_line);
    match end {
        Ok(StreamEnd::Exited(status)) if status.success() => {
            debug!(agent, session_id = ?session_id, "agent turn finished");
            Ok(AgentResult { session_id })
        }
        Ok(StreamEnd::Exited(status)) => Err(AgentError::Exit {
            agent: agent.to_string(),
            code: status.code(),
        }),
        Ok(StreamEnd::Cancelled) => Err(AgentError::Cancelled {
            agent: agent.to_string(),
        }),
        Err(StreamError::Spawn(source)) => Err(AgentError::Spawn {
            agent: agent.to_string(),
            source,
        }),
        Err(StreamError::Io(source)) => Err(AgentError::Stream {
            agent: agent.to_string(),
            source,
        }),
    }
}

/// Parse a line as a JSON object, ignoring anything else.
pub(crate) fn json_object(line: &str) -> Option<serde_json::Map<String, serde_json::Value>> {
    match serde_json::from_str::<serde_json::Value>(line) {
        Ok(serde_json::Value::Object(map)) => Some(map),
        _ => None,
    }
}
