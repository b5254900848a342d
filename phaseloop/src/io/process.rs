//! Helpers for running child processes: availability checks and cancellable
//! line streaming.

use std::io::{BufRead, BufReader, Write};
use std::path::Path;
use std::process::{Command, ExitStatus, Stdio};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::Duration;

use tracing::{debug, error, instrument, warn};
use wait_timeout::ChildExt;

use crate::agent::CancelToken;

/// How often a streaming child checks its cancel token.
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// True when `binary --version` exits successfully within `timeout`.
///
/// Output is discarded; a child still running at the deadline is killed.
#[instrument(skip_all, fields(binary = %binary.display(), timeout_secs = timeout.as_secs()))]
pub fn command_succeeds(binary: &Path, timeout: Duration) -> bool {
    let spawned = Command::new(binary)
        .arg("--version")
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn();
    let mut child = match spawned {
        Ok(child) => child,
        Err(e) => {
            debug!(err = %e, "binary could not be started");
            return false;
        }
    };
    match child.wait_timeout(timeout) {
        Ok(Some(status)) => status.success(),
        Ok(None) => {
            warn!("version check timed out, killing");
            kill_and_reap(&mut child);
            false
        }
        Err(e) => {
            debug!(err = %e, "failed to wait for version check");
            kill_and_reap(&mut child);
            false
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StreamError {
    #[error("spawn: {0}")]
    Spawn(#[source] std::io::Error),
    #[error("read: {0}")]
    Io(#[from] std::io::Error),
}

/// How a streamed child finished.
#[derive(Debug)]
pub enum StreamEnd {
    Exited(ExitStatus),
    /// The cancel token fired; the child was killed and reaped.
    Cancelled,
}

/// Spawn `cmd`, feed `stdin`, and hand each stdout line to `on_line` on the
/// calling thread. The child's stderr is inherited.
///
/// Lines arrive through a channel from a reader thread so the caller keeps
/// polling `cancel` even while the child is silent. Invalid UTF-8 is replaced
/// rather than rejected.
#[instrument(skip_all, fields(program = ?cmd.get_program()))]
pub fn stream_lines(
    mut cmd: Command,
    stdin: Option<String>,
    cancel: &CancelToken,
    on_line: &mut dyn FnMut(&str),
) -> Result<StreamEnd, StreamError> {
    if stdin.is_some() {
        cmd.stdin(Stdio::piped());
    } else {
        cmd.stdin(Stdio::null());
    }
    cmd.stdout(Stdio::piped()).stderr(Stdio::inherit());

    debug!("spawning streaming child");
    let mut child = cmd.spawn().map_err(StreamError::Spawn)?;

    let stdin_handle = match (stdin, child.stdin.take()) {
        (Some(input), Some(mut pipe)) => Some(thread::spawn(move || {
            // The child may exit before reading everything; that surfaces as
            // its exit status, not here.
            if let Err(e) = pipe.write_all(input.as_bytes()) {
                debug!(err = %e, "child closed stdin early");
            }
        })),
        _ => None,
    };

    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| std::io::Error::other("stdout was not piped"))?;
    let (tx, rx) = mpsc::channel::<std::io::Result<String>>();
    thread::spawn(move || {
        let mut reader = BufReader::new(stdout);
        let mut buf = Vec::new();
        loop {
            buf.clear();
            match reader.read_until(b'\n', &mut buf) {
                Ok(0) => break,
                Ok(_) => {
                    let line = String::from_utf8_lossy(&buf);
                    let line = line.trim_end_matches(['\n', '\r']).to_string();
                    if tx.send(Ok(line)).is_err() {
                        break;
                    }
                }
                Err(e) => {
                    let _ = tx.send(Err(e));
                    break;
                }
            }
        }
    });

    loop {
        if cancel.is_cancelled() {
            kill_and_reap(&mut child);
            return Ok(StreamEnd::Cancelled);
        }
        match rx.recv_timeout(POLL_INTERVAL) {
            Ok(Ok(line)) => on_line(&line),
            Ok(Err(e)) => {
                error!(err = %e, "failed to read child stdout");
                kill_and_reap(&mut child);
                return Err(StreamError::Io(e));
            }
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }

    let status = loop {
        if cancel.is_cancelled() {
            kill_and_reap(&mut child);
            return Ok(StreamEnd::Cancelled);
        }
        if let Some(status) = child.wait_timeout(POLL_INTERVAL)? {
            break status;
        }
    };

    if let Some(handle) = stdin_handle
        && handle.join().is_err()
    {
        warn!("stdin writer thread panicked");
    }

    debug!(exit_code = ?status.code(), "streaming child finished");
    Ok(StreamEnd::Exited(status))
}

fn kill_and_reap(child: &mut std::process::Child) {
    if let Err(e) = child.kill() {
        debug!(err = %e, "kill failed; child likely already exited");
    }
    if let Err(e) = child.wait() {
        warn!(err = %e, "failed to reap killed child");
    }
}

#[cfg(all(test, unix))]
mod tests {
    use std::time::Instant;

    use super::*;

    fn write_script(dir: &Path, name: &str, body: &str) -> std::path::PathBuf {
        use std::os::unix::fs::PermissionsExt;

        let path = dir.join(name);
        std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).expect("write script");
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755))
            .expect("chmod script");
        path
    }

    fn sh(script: &str) -> Command {
        let mut cmd = Command::new("sh");
        cmd.arg("-c").arg(script);
        cmd
    }

    #[test]
    fn streams_lines_in_order() {
        let mut lines = Vec::new();
        let end = stream_lines(
            sh("printf 'one\\ntwo\\r\\nthree'"),
            None,
            &CancelToken::new(),
            &mut |line| lines.push(line.to_string()),
        )
        .expect("stream");
        assert_eq!(lines, vec!["one", "two", "three"]);
        assert!(matches!(end, StreamEnd::Exited(status) if status.success()));
    }

    #[test]
    fn stdin_is_delivered_and_exit_code_kept() {
        let mut lines = Vec::new();
        let end = stream_lines(
            sh("cat; exit 3"),
            Some("hello\nworld\n".to_string()),
            &CancelToken::new(),
            &mut |line| lines.push(line.to_string()),
        )
        .expect("stream");
        assert_eq!(lines, vec!["hello", "world"]);
        assert!(matches!(end, StreamEnd::Exited(status) if status.code() == Some(3)));
    }

    #[test]
    fn cancel_kills_a_silent_child() {
        let cancel = CancelToken::new();
        let started = Instant::now();
        let end = stream_lines(sh("echo ready; exec sleep 30"), None, &cancel, &mut |_| {
            cancel.cancel()
        })
        .expect("stream");
        assert!(matches!(end, StreamEnd::Cancelled));
        assert!(started.elapsed() < Duration::from_secs(10));
    }

    #[test]
    fn missing_binary_is_a_spawn_error() {
        let err = stream_lines(
            Command::new("/nonexistent/phaseloop-agent"),
            None,
            &CancelToken::new(),
            &mut |_| {},
        )
        .expect_err("spawn should fail");
        assert!(matches!(err, StreamError::Spawn(_)));
        assert!(!command_succeeds(
            Path::new("/nonexistent/phaseloop-agent"),
            Duration::from_secs(1)
        ));
    }

    #[test]
    fn version_check_needs_a_successful_exit() {
        let dir = tempfile::tempdir().expect("tempdir");
        let broken = write_script(dir.path(), "broken-agent", "exit 1");
        let slow = write_script(dir.path(), "slow-agent", "exec sleep 30");

        assert!(command_succeeds(Path::new("git"), Duration::from_secs(10)));
        assert!(!command_succeeds(&broken, Duration::from_secs(10)));
        let started = Instant::now();
        assert!(!command_succeeds(&slow, Duration::from_millis(200)));
        assert!(started.elapsed() < Duration::from_secs(10));
    }
}
