//! `phaseloop` command-line entry point.

use std::path::Path;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use serde::Serialize;

use phaseloop::agent::guard::with_agent_guards;
use phaseloop::agent::resolve::resolve_agent;
use phaseloop::agent::{Agent, CancelToken};
use phaseloop::core::classifier::classify_diff;
use phaseloop::core::workflow::{Observation, Step, infer_step};
use phaseloop::exit_codes;
use phaseloop::harvest::harvest;
use phaseloop::io::config::{PhaseloopConfig, config_path, load_config, write_config};
use phaseloop::io::git::Git;
use phaseloop::io::prompt::Prompts;
use phaseloop::io::session::FileSessionStore;
use phaseloop::logging::{self, notice};
use phaseloop::looping::{LoopStop, run_loop};
use phaseloop::phases::PhaseContext;
use phaseloop::step::{StepOutcome, run_step};

#[derive(Parser)]
#[command(
    name = "phaseloop",
    version,
    about = "Git-driven plan/build/learn loop for coding agents"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Write a default `phaseloop.toml` at the repository root.
    Init {
        /// Overwrite an existing config.
        #[arg(short, long)]
        force: bool,
    },
    /// Print the observed repository state and the step it implies.
    Status {
        /// Emit JSON instead of text.
        #[arg(long)]
        json: bool,
    },
    /// Run one inferred step.
    Step {
        /// Agent provider (`auto`, `claude`, `codex`, `opencode`); overrides config.
        #[arg(long)]
        provider: Option<String>,
    },
    /// Run steps until idle, interrupted, or the step limit.
    Loop {
        #[arg(long)]
        provider: Option<String>,
        /// Stop after this many steps.
        #[arg(long)]
        max_steps: Option<usize>,
    },
    /// Show how the uncommitted changes would be split, without committing.
    Classify,
}

fn main() {
    logging::init();
    match run() {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("{}", logging::notice_line(&format!("{err:#}")));
            std::process::exit(exit_codes::INVALID);
        }
    }
}

fn run() -> Result<i32> {
    let cli = Cli::parse();
    let cwd = std::env::current_dir().context("read current directory")?;
    match cli.command {
        Command::Init { force } => cmd_init(&cwd, force),
        Command::Status { json } => cmd_status(&cwd, json),
        Command::Step { provider } => cmd_step(&cwd, provider.as_deref()),
        Command::Loop {
            provider,
            max_steps,
        } => cmd_loop(&cwd, provider.as_deref(), max_steps),
        Command::Classify => cmd_classify(&cwd),
    }
}

fn cmd_init(cwd: &Path, force: bool) -> Result<i32> {
    let git = Git::discover(cwd)?;
    let path = config_path(git.workdir());
    if path.exists() && !force {
        bail!("{} already exists (use --force to overwrite)", path.display());
    }
    write_config(&path, &PhaseloopConfig::default())?;
    notice(&format!("wrote {}", path.display()));
    Ok(exit_codes::OK)
}

#[derive(Serialize)]
struct StatusReport {
    observation: Observation,
    step: Step,
}

fn cmd_status(cwd: &Path, json: bool) -> Result<i32> {
    let (git, config) = open_repo(cwd)?;
    let observation = harvest(&git, &config.plan_file);
    let report = StatusReport {
        observation,
        step: infer_step(&observation),
    };
    if json {
        let payload = serde_json::to_string_pretty(&report).context("serialize status")?;
        println!("{payload}");
        return Ok(exit_codes::OK);
    }

    let marker = |m: Option<phaseloop::core::marker::Marker>| {
        m.map_or_else(|| "none".to_string(), |m| format!("{} {m}", m.glyph()))
    };
    println!("uncommitted changes: {}", observation.has_uncommitted_changes);
    println!("last commit: {}", marker(observation.last_commit_prefix));
    println!("unchecked items: {}", observation.has_unchecked_items);
    println!("only learnings modified: {}", observation.only_learnings_modified);
    println!("plan file is new: {}", observation.todo_file_is_new);
    println!("previous phase: {}", marker(observation.prev_phase_prefix));
    println!("next step: {}", report.step);
    Ok(exit_codes::OK)
}

fn cmd_step(cwd: &Path, provider: Option<&str>) -> Result<i32> {
    let session = Session::open(cwd, provider)?;
    let outcome = session.with_context(run_step)?;
    Ok(match outcome {
        StepOutcome::Idle => exit_codes::IDLE,
        StepOutcome::Committed { .. } | StepOutcome::Interrupted { .. } => exit_codes::OK,
    })
}

fn cmd_loop(cwd: &Path, provider: Option<&str>, max_steps: Option<usize>) -> Result<i32> {
    let session = Session::open(cwd, provider)?;
    let outcome = session.with_context(|ctx| run_loop(ctx, max_steps, |_| {}))?;
    let reason = match &outcome.stop {
        LoopStop::Idle => "idle".to_string(),
        LoopStop::Interrupted { step, reason } => format!("{step} interrupted ({reason})"),
        LoopStop::MaxSteps { max_steps } => format!("reached --max-steps {max_steps}"),
        LoopStop::Cancelled => "cancelled".to_string(),
    };
    notice(&format!(
        "loop stopped after {} step(s): {reason}",
        outcome.steps_executed
    ));
    Ok(exit_codes::OK)
}

fn cmd_classify(cwd: &Path) -> Result<i32> {
    let (git, config) = open_repo(cwd)?;
    let diff = git.diff_working_tree()?;
    let classified = classify_diff(&diff, &config.plan_file);
    if classified.is_empty() {
        println!("no hunks to classify");
        return Ok(exit_codes::OK);
    }
    for kind in classified.kinds() {
        let files: Vec<&str> = classified
            .files(kind)
            .iter()
            .map(|f| f.path.as_str())
            .collect();
        println!(
            "{} {}: {} hunk(s) in {}",
            kind.marker().glyph(),
            kind.as_str(),
            classified.hunk_count(kind),
            files.join(", ")
        );
    }
    Ok(exit_codes::OK)
}

fn open_repo(cwd: &Path) -> Result<(Git, PhaseloopConfig)> {
    let git = Git::discover(cwd)?;
    let config = load_config(&config_path(git.workdir()))?;
    Ok((git, config))
}

/// Owned pieces behind a [`PhaseContext`] for one CLI invocation.
struct Session {
    git: Git,
    config: PhaseloopConfig,
    agent: Box<dyn Agent>,
    sessions: FileSessionStore,
    prompts: Prompts,
    cancel: CancelToken,
}

impl Session {
    fn open(cwd: &Path, provider: Option<&str>) -> Result<Self> {
        let (git, config) = open_repo(cwd)?;
        let requested = provider.unwrap_or(&config.provider);
        let agent = resolve_agent(requested, |p| config.binaries.binary_for(p))
            .context("select agent")?;
        let agent = with_agent_guards(agent, config.guards.guard_config());
        let sessions = FileSessionStore::for_repo(&git)?;
        let prompts = Prompts::new(&config.plan_file)?;
        Ok(Self {
            git,
            config,
            agent,
            sessions,
            prompts,
            cancel: CancelToken::new(),
        })
    }

    fn with_context<T>(&self, f: impl FnOnce(&PhaseContext<'_>) -> Result<T>) -> Result<T> {
        let ctx = PhaseContext {
            git: &self.git,
            agent: &*self.agent,
            sessions: &self.sessions,
            prompts: &self.prompts,
            config: &self.config,
            cancel: &self.cancel,
        };
        f(&ctx)
    }
}
