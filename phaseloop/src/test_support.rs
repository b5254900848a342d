//! Test-only helpers: throwaway git repositories and scripted agents.

use std::collections::VecDeque;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::{Mutex, PoisonError};

use anyhow::{Context, Result, anyhow};
use tempfile::TempDir;

use crate::agent::{Agent, AgentError, AgentEvent, AgentResult, CancelToken, Invocation, Provider};
use crate::io::git::Git;

/// Temporary git repository with a configured identity.
pub struct TestRepo {
    dir: TempDir,
}

impl TestRepo {
    pub fn new() -> Result<Self> {
        let dir = tempfile::tempdir().context("create temp dir")?;
        let repo = Self { dir };
        repo.git_cmd(&["init", "-q"])?;
        repo.git_cmd(&["config", "user.email", "test@example.com"])?;
        repo.git_cmd(&["config", "user.name", "Test"])?;
        repo.git_cmd(&["config", "commit.gpgsign", "false"])?;
        Ok(repo)
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn git(&self) -> Git {
        Git::new(self.path())
    }

    /// Write `contents` to a repository-relative path, creating parents.
    pub fn write(&self, rel: &str, contents: &str) -> Result<()> {
        let path = self.path().join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, contents).with_context(|| format!("write {}", path.display()))
    }

    pub fn read(&self, rel: &str) -> Result<String> {
        let path = self.path().join(rel);
        fs::read_to_string(&path).with_context(|| format!("read {}", path.display()))
    }

    /// Stage everything and commit, allowing empty commits.
    pub fn commit(&self, message: &str) -> Result<()> {
        self.git_cmd(&["add", "-A"])?;
        self.git_cmd(&["commit", "-q", "--allow-empty", "-m", message])
    }

    /// Commit subjects, newest first.
    pub fn subjects(&self) -> Result<Vec<String>> {
        self.git().recent_subjects(100)
    }

    fn git_cmd(&self, args: &[&str]) -> Result<()> {
        let status = Command::new("git")
            .args(args)
            .current_dir(self.path())
            .status()
            .with_context(|| format!("spawn git {}", args.join(" ")))?;
        if !status.success() {
            return Err(anyhow!("git {} failed", args.join(" ")));
        }
        Ok(())
    }
}

/// One scripted agent turn.
pub struct ScriptedTurn {
    events: Vec<AgentEvent>,
    writes: Vec<(PathBuf, String)>,
    outcome: Result<AgentResult, AgentError>,
}

impl ScriptedTurn {
    /// Successful turn ending with `text`.
    pub fn reply(text: &str) -> Self {
        Self {
            events: vec![
                AgentEvent::AgentStart,
                AgentEvent::TurnStart,
                AgentEvent::TurnEnd(text.to_string()),
                AgentEvent::AgentEnd,
            ],
            writes: Vec::new(),
            outcome: Ok(AgentResult::default()),
        }
    }

    /// Failing turn that emits no events.
    pub fn fail(err: AgentError) -> Self {
        Self {
            events: Vec::new(),
            writes: Vec::new(),
            outcome: Err(err),
        }
    }

    /// Report `session_id` on success.
    pub fn with_session(mut self, session_id: &str) -> Self {
        if let Ok(result) = &mut self.outcome {
            result.session_id = Some(session_id.to_string());
        }
        self
    }

    /// Write a file (relative to the invocation cwd) during the turn.
    pub fn writes(mut self, rel: &str, contents: &str) -> Self {
        self.writes.push((PathBuf::from(rel), contents.to_string()));
        self
    }

    /// Append an extra event before the terminal one.
    pub fn event(mut self, event: AgentEvent) -> Self {
        let at = self.events.len().saturating_sub(1);
        self.events.insert(at, event);
        self
    }
}

/// Agent that replays queued turns and records every invocation.
///
/// Once the queue is empty each call succeeds silently.
pub struct ScriptedAgent {
    turns: Mutex<VecDeque<ScriptedTurn>>,
    invocations: Mutex<Vec<Invocation>>,
}

impl ScriptedAgent {
    pub fn new(turns: Vec<ScriptedTurn>) -> Self {
        Self {
            turns: Mutex::new(turns.into()),
            invocations: Mutex::new(Vec::new()),
        }
    }

    pub fn invocations(&self) -> Vec<Invocation> {
        self.invocations
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn remaining(&self) -> usize {
        self.turns.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}

impl Agent for ScriptedAgent {
    fn name(&self) -> &str {
        "scripted"
    }

    fn provider(&self) -> Provider {
        Provider::Claude
    }

    fn invoke(
        &self,
        invocation: &Invocation,
        on_event: &mut dyn FnMut(AgentEvent),
        cancel: &CancelToken,
    ) -> Result<AgentResult, AgentError> {
        self.invocations
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(invocation.clone());
        let turn = self
            .turns
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front();
        let Some(turn) = turn else {
            return Ok(AgentResult::default());
        };
        for (rel, contents) in &turn.writes {
            let path = invocation.cwd.join(rel);
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::write(path, contents)?;
        }
        for event in turn.events {
            if cancel.is_cancelled() {
                return Err(AgentError::Cancelled {
                    agent: self.name().to_string(),
                });
            }
            on_event(event);
        }
        turn.outcome
    }

    fn is_available(&self) -> bool {
        true
    }
}
