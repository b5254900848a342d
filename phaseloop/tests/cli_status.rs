//! CLI tests for the read-only and setup commands.
//!
//! Spawns the phaseloop binary inside temporary repositories and checks exit
//! codes and output. No agent CLI is ever started.

use std::process::{Command, Output};

use phaseloop::exit_codes;
use phaseloop::io::config::{CONFIG_FILE, load_config};
use phaseloop::test_support::TestRepo;
use serde_json::Value;

const PLAN: &str = "## Auth\n- [ ] login\n\n## Learnings\n";

fn phaseloop(repo: &TestRepo, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_phaseloop"))
        .current_dir(repo.path())
        .args(args)
        .output()
        .expect("run phaseloop")
}

#[test]
fn status_json_reports_observation_and_step() {
    let repo = TestRepo::new().expect("repo");
    repo.write("TODO.md", PLAN).expect("write");
    repo.commit("📋 create plan").expect("commit");

    let out = phaseloop(&repo, &["status", "--json"]);
    assert_eq!(out.status.code(), Some(exit_codes::OK));
    let report: Value = serde_json::from_slice(&out.stdout).expect("json");
    assert_eq!(report["step"], "build");
    assert_eq!(report["observation"]["last_commit_prefix"], "plan");
    assert_eq!(report["observation"]["has_unchecked_items"], true);
    assert_eq!(report["observation"]["has_uncommitted_changes"], false);
    assert_eq!(report["observation"]["prev_phase_prefix"], Value::Null);
}

#[test]
fn status_text_runs_from_a_subdirectory() {
    let repo = TestRepo::new().expect("repo");
    repo.write("src/lib.rs", "\n").expect("write");
    repo.commit("🧹 tidy up").expect("commit");

    let out = Command::new(env!("CARGO_BIN_EXE_phaseloop"))
        .current_dir(repo.path().join("src"))
        .arg("status")
        .output()
        .expect("run phaseloop");
    assert_eq!(out.status.code(), Some(exit_codes::OK));
    let stdout = String::from_utf8_lossy(&out.stdout);
    assert!(stdout.contains("last commit: 🧹 cleanup"), "{stdout}");
    assert!(stdout.contains("next step: idle"), "{stdout}");
}

#[test]
fn status_outside_a_repository_is_invalid() {
    let dir = tempfile::tempdir().expect("tempdir");
    let out = Command::new(env!("CARGO_BIN_EXE_phaseloop"))
        .current_dir(dir.path())
        .arg("status")
        .output()
        .expect("run phaseloop");
    assert_eq!(out.status.code(), Some(exit_codes::INVALID));
}

#[test]
fn step_on_idle_repository_exits_idle() {
    let repo = TestRepo::new().expect("repo");
    repo.commit("🧹 tidy up").expect("commit");

    let out = phaseloop(&repo, &["step", "--provider", "claude"]);
    assert_eq!(out.status.code(), Some(exit_codes::IDLE));
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(stderr.contains("[phaseloop] nothing to do"), "{stderr}");
}

#[test]
fn step_with_unknown_provider_is_invalid() {
    let repo = TestRepo::new().expect("repo");
    repo.commit("🧹 tidy up").expect("commit");

    let out = phaseloop(&repo, &["step", "--provider", "gpt-cli"]);
    assert_eq!(out.status.code(), Some(exit_codes::INVALID));
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(
        stderr.contains("[phaseloop] ") && stderr.contains("gpt-cli"),
        "{stderr}"
    );
}

#[test]
fn classify_lists_categories_without_committing() {
    let repo = TestRepo::new().expect("repo");
    repo.write("TODO.md", PLAN).expect("write");
    repo.write("src/app.ts", "const a = 1;\n").expect("write");
    repo.commit("📋 create plan").expect("commit");
    repo.write("src/app.ts", "const a = 1;\n// TODO: fix me\n")
        .expect("write");
    repo.write("TODO.md", &format!("{PLAN}> keep it small\n"))
        .expect("write");

    let out = phaseloop(&repo, &["classify"]);
    assert_eq!(out.status.code(), Some(exit_codes::OK));
    let stdout = String::from_utf8_lossy(&out.stdout);
    assert!(stdout.contains("feedback: 1 hunk(s) in TODO.md"), "{stdout}");
    assert!(stdout.contains("human: 1 hunk(s) in src/app.ts"), "{stdout}");
    assert!(!stdout.contains("fix:"), "{stdout}");
    assert_eq!(
        repo.subjects().expect("subjects"),
        vec!["📋 create plan"]
    );
    assert!(repo.git().has_uncommitted_changes().expect("status"));
}

#[test]
fn init_writes_default_config_once() {
    let repo = TestRepo::new().expect("repo");

    let out = phaseloop(&repo, &["init"]);
    assert_eq!(out.status.code(), Some(exit_codes::OK));
    let cfg = load_config(&repo.path().join(CONFIG_FILE)).expect("load config");
    assert_eq!(cfg.max_build_attempts, 3);

    let out = phaseloop(&repo, &["init"]);
    assert_eq!(out.status.code(), Some(exit_codes::INVALID));

    let out = phaseloop(&repo, &["init", "--force"]);
    assert_eq!(out.status.code(), Some(exit_codes::OK));
}
