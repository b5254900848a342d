//! Git adapter for phaseloop.
//!
//! Every read and write the workflow needs goes through this small, explicit
//! wrapper around `git` subprocess calls. Writes that stage before committing
//! restore the index when the commit fails.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};

use anyhow::{Context, Result, anyhow};
use tracing::{debug, instrument, warn};

/// Parsed `git status --porcelain` entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusEntry {
    /// 2-letter XY code, or "??" for untracked.
    pub code: String,
    /// Path for the changed file.
    pub path: String,
}

/// Wrapper for executing git commands in a working directory.
#[derive(Debug, Clone)]
pub struct Git {
    workdir: PathBuf,
}

impl Git {
    pub fn new(workdir: impl Into<PathBuf>) -> Self {
        Self {
            workdir: workdir.into(),
        }
    }

    /// Open the repository whose working tree contains `dir`.
    pub fn discover(dir: &Path) -> Result<Self> {
        let out = Self::new(dir)
            .run_capture(&["rev-parse", "--show-toplevel"])
            .with_context(|| format!("{} is not inside a git repository", dir.display()))?;
        Ok(Self::new(out.trim()))
    }

    pub fn workdir(&self) -> &Path {
        &self.workdir
    }

    /// Absolute path of the repository's git directory.
    pub fn git_dir(&self) -> Result<PathBuf> {
        let out = self.run_capture(&["rev-parse", "--git-dir"])?;
        let dir = PathBuf::from(out.trim());
        Ok(if dir.is_absolute() {
            dir
        } else {
            self.workdir.join(dir)
        })
    }

    /// True once the repository has at least one commit.
    pub fn has_head(&self) -> Result<bool> {
        Ok(self
            .run(&["rev-parse", "--verify", "--quiet", "HEAD"])?
            .status
            .success())
    }

    /// Get status entries (including untracked) in porcelain format.
    pub fn status_porcelain(&self) -> Result<Vec<StatusEntry>> {
        let out = self.run_capture(&["status", "--porcelain=v1", "-uall"])?;
        let mut entries = Vec::new();
        for line in out.lines() {
            if line.trim().is_empty() {
                continue;
            }
            entries.push(parse_status_line(line)?);
        }
        Ok(entries)
    }

    /// Staged, unstaged, or untracked changes present.
    pub fn has_uncommitted_changes(&self) -> Result<bool> {
        Ok(!self.status_porcelain()?.is_empty())
    }

    /// Subject of the latest commit; `None` on an unborn branch.
    pub fn last_commit_subject(&self) -> Result<Option<String>> {
        if !self.has_head()? {
            return Ok(None);
        }
        let out = self.run_capture(&["log", "-1", "--pretty=%s"])?;
        Ok(Some(out.trim_end_matches('\n').to_string()))
    }

    /// Subjects of the last `n` commits, newest first.
    pub fn recent_subjects(&self, n: usize) -> Result<Vec<String>> {
        if !self.has_head()? {
            return Ok(Vec::new());
        }
        let limit = format!("-{n}");
        let out = self.run_capture(&["log", &limit, "--pretty=%s"])?;
        Ok(out.lines().map(str::to_string).collect())
    }

    /// True when `path` exists in the tree of `rev`. Unknown revisions count as absent.
    pub fn file_exists_at(&self, rev: &str, path: &Path) -> Result<bool> {
        let spec = object_spec(rev, path);
        Ok(self.run(&["cat-file", "-e", &spec])?.status.success())
    }

    /// Contents of `path` at `rev`.
    pub fn show_file(&self, rev: &str, path: &Path) -> Result<String> {
        let spec = object_spec(rev, path);
        self.run_capture(&["show", &spec])
    }

    /// `git diff <from> <to> [-- paths]`.
    pub fn diff_range(&self, from: &str, to: &str, paths: &[&Path]) -> Result<String> {
        let mut args: Vec<String> = ["diff", "--no-color", "--no-ext-diff", from, to]
            .into_iter()
            .map(String::from)
            .collect();
        if !paths.is_empty() {
            args.push("--".to_string());
            args.extend(paths.iter().map(|p| path_arg(p)));
        }
        let args: Vec<&str> = args.iter().map(String::as_str).collect();
        self.run_capture(&args)
    }

    /// Paths changed between two revisions.
    pub fn changed_paths(&self, from: &str, to: &str) -> Result<Vec<String>> {
        let out = self.run_capture(&["diff", "--name-only", from, to])?;
        Ok(out
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(str::to_string)
            .collect())
    }

    /// Unified diff of every uncommitted change against HEAD, untracked files
    /// included. Leaves the index unstaged.
    #[instrument(skip_all)]
    pub fn diff_working_tree(&self) -> Result<String> {
        self.reset_index()?;
        // NUL-separated so unusual names come back raw instead of C-quoted.
        let untracked: Vec<String> = self
            .run_capture(&["ls-files", "-z", "--others", "--exclude-standard"])?
            .split('\0')
            .filter(|path| !path.is_empty())
            .map(str::to_string)
            .collect();

        if !untracked.is_empty() {
            let mut args = vec!["add", "--intent-to-add", "--"];
            args.extend(untracked.iter().map(String::as_str));
            self.run_checked(&args)?;
        }

        let diff = self.run_capture(&[
            "-c",
            "core.quotepath=false",
            "diff",
            "--no-color",
            "--no-ext-diff",
        ]);

        if !untracked.is_empty() {
            let mut args = vec!["reset", "-q", "--"];
            args.extend(untracked.iter().map(String::as_str));
            if let Err(e) = self.run_checked(&args) {
                warn!(err = %e, "failed to drop intent-to-add entries");
            }
        }
        debug!(untracked = untracked.len(), "collected working tree diff");
        diff
    }

    /// Stage all changes (respects .gitignore).
    pub fn add_all(&self) -> Result<()> {
        self.run_checked(&["add", "-A"])?;
        Ok(())
    }

    /// True if there is anything staged for commit.
    pub fn has_staged_changes(&self) -> Result<bool> {
        let out = self.run(&["diff", "--cached", "--name-only"])?;
        Ok(!String::from_utf8_lossy(&out.stdout).trim().is_empty())
    }

    /// Unstage everything, keeping the working tree.
    pub fn reset_index(&self) -> Result<()> {
        self.run_checked(&["reset", "-q"])?;
        Ok(())
    }

    /// Commit the index with `message`.
    #[instrument(skip_all, fields(allow_empty))]
    pub fn commit(&self, message: &str, allow_empty: bool) -> Result<()> {
        let mut args = vec!["commit", "-q", "-m", message];
        if allow_empty {
            args.push("--allow-empty");
        }
        self.run_checked(&args)?;
        Ok(())
    }

    /// Stage everything and commit it; the index is reset if the commit fails.
    #[instrument(skip_all)]
    pub fn commit_all(&self, message: &str, allow_empty: bool) -> Result<()> {
        self.add_all()?;
        if let Err(err) = self.commit(message, allow_empty) {
            self.restore_index();
            return Err(err).context("commit all changes");
        }
        debug!(message, "committed all changes");
        Ok(())
    }

    /// Stage `patch` with `git apply --cached`.
    pub fn apply_cached(&self, patch: &str) -> Result<()> {
        self.run_with_stdin(
            &["apply", "--cached", "--whitespace=nowarn", "-"],
            patch.as_bytes(),
        )?;
        Ok(())
    }

    /// Stage exactly `patch` and commit it; the index is reset if either step fails.
    #[instrument(skip_all)]
    pub fn commit_patch(&self, patch: &str, message: &str) -> Result<()> {
        let result = self
            .apply_cached(patch)
            .and_then(|()| self.commit(message, false));
        if let Err(err) = result {
            self.restore_index();
            return Err(err).context("commit patch");
        }
        debug!(message, "committed patch");
        Ok(())
    }

    fn restore_index(&self) {
        if let Err(e) = self.reset_index() {
            warn!(err = %e, "failed to reset index after failed commit");
        }
    }

    fn run_capture(&self, args: &[&str]) -> Result<String> {
        let output = self.run_checked(args)?;
        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }

    fn run_checked(&self, args: &[&str]) -> Result<Output> {
        let output = self.run(args)?;
        check_status(args, output)
    }

    fn run(&self, args: &[&str]) -> Result<Output> {
        Command::new("git")
            .args(args)
            .current_dir(&self.workdir)
            .output()
            .with_context(|| format!("spawn git {}", args.join(" ")))
    }

    fn run_with_stdin(&self, args: &[&str], input: &[u8]) -> Result<Output> {
        let mut child = Command::new("git")
            .args(args)
            .current_dir(&self.workdir)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .with_context(|| format!("spawn git {}", args.join(" ")))?;
        child
            .stdin
            .take()
            .ok_or_else(|| anyhow!("stdin was not piped"))?
            .write_all(input)
            .context("write git stdin")?;
        let output = child
            .wait_with_output()
            .with_context(|| format!("wait for git {}", args.join(" ")))?;
        check_status(args, output)
    }
}

fn check_status(args: &[&str], output: Output) -> Result<Output> {
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(anyhow!("git {} failed: {}", args.join(" "), stderr.trim()));
    }
    Ok(output)
}

/// Repository-relative path with forward slashes, as git expects.
fn path_arg(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}

fn object_spec(rev: &str, path: &Path) -> String {
    format!("{rev}:{}", path_arg(path))
}

fn parse_status_line(line: &str) -> Result<StatusEntry> {
    if let Some(path) = line.strip_prefix("?? ") {
        return Ok(StatusEntry {
            code: "??".to_string(),
            path: path.trim().to_string(),
        });
    }
    if line.len() < 4 {
        return Err(anyhow!("unexpected porcelain line: '{line}'"));
    }
    let code = line[..2].to_string();
    let mut path = line[3..].trim().to_string();
    if let Some((_, new)) = path.split_once("->") {
        path = new.trim().to_string();
    }
    Ok(StatusEntry { code, path })
}
