//! Configuration stored in `phaseloop.toml` at the repository root.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

use crate::agent::Provider;
use crate::agent::guard::GuardConfig;
use crate::agent::resolve::AUTO;

/// File name of the config, relative to the repository root.
pub const CONFIG_FILE: &str = "phaseloop.toml";

/// Phaseloop configuration (TOML).
///
/// Edited by humans; every field is optional and defaults to the values
/// `phaseloop init` writes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct PhaseloopConfig {
    /// `auto` or a provider name.
    pub provider: String,

    /// Plan file, relative to the repository root.
    pub plan_file: PathBuf,

    /// Turns a build phase may spend finishing one package.
    pub max_build_attempts: u32,

    /// Diff bytes sent to the agent when writing a commit message.
    pub commit_diff_limit_bytes: usize,

    pub guards: GuardsConfig,

    pub binaries: BinariesConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct GuardsConfig {
    /// Seconds without agent events before the turn is abandoned; 0 disables.
    pub inactivity_timeout_secs: u64,

    /// Tools that signal the agent wants a human.
    pub forbidden_tools: Vec<String>,
}

/// Executables used for each provider.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct BinariesConfig {
    pub claude: PathBuf,
    pub codex: PathBuf,
    pub opencode: PathBuf,
}

impl Default for PhaseloopConfig {
    fn default() -> Self {
        Self {
            provider: AUTO.to_string(),
            plan_file: PathBuf::from("TODO.md"),
            max_build_attempts: 3,
            commit_diff_limit_bytes: 20_000,
            guards: GuardsConfig::default(),
            binaries: BinariesConfig::default(),
        }
    }
}

impl Default for GuardsConfig {
    fn default() -> Self {
        Self {
            inactivity_timeout_secs: 600,
            forbidden_tools: vec!["AskUserQuestion".to_string()],
        }
    }
}

impl Default for BinariesConfig {
    fn default() -> Self {
        Self {
            claude: PathBuf::from("claude"),
            codex: PathBuf::from("codex"),
            opencode: PathBuf::from("opencode"),
        }
    }
}

impl GuardsConfig {
    pub fn guard_config(&self) -> GuardConfig {
        GuardConfig {
            inactivity_timeout: Duration::from_secs(self.inactivity_timeout_secs),
            forbidden_tools: self.forbidden_tools.clone(),
        }
    }
}

impl BinariesConfig {
    pub fn binary_for(&self, provider: Provider) -> PathBuf {
        match provider {
            Provider::Claude => self.claude.clone(),
            Provider::Codex => self.codex.clone(),
            Provider::Opencode => self.opencode.clone(),
        }
    }
}

impl PhaseloopConfig {
    pub fn validate(&self) -> Result<()> {
        let provider = self.provider.trim();
        if !provider.eq_ignore_ascii_case(AUTO) {
            provider
                .parse::<Provider>()
                .map_err(|e| anyhow!("provider: {e}"))?;
        }
        if self.plan_file.as_os_str().is_empty() {
            return Err(anyhow!("plan_file must not be empty"));
        }
        if self.plan_file.is_absolute() {
            return Err(anyhow!("plan_file must be relative to the repository root"));
        }
        if self.max_build_attempts == 0 {
            return Err(anyhow!("max_build_attempts must be > 0"));
        }
        if self.commit_diff_limit_bytes == 0 {
            return Err(anyhow!("commit_diff_limit_bytes must be > 0"));
        }
        if self.guards.forbidden_tools.iter().any(|t| t.trim().is_empty()) {
            return Err(anyhow!("guards.forbidden_tools must not contain empty names"));
        }
        for provider in Provider::ALL {
            if self.binaries.binary_for(provider).as_os_str().is_empty() {
                return Err(anyhow!("binaries.{provider} must not be empty"));
            }
        }
        Ok(())
    }
}

/// Config path for a repository root.
pub fn config_path(root: &Path) -> PathBuf {
    root.join(CONFIG_FILE)
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `PhaseloopConfig::default()`.
pub fn load_config(path: &Path) -> Result<PhaseloopConfig> {
    if !path.exists() {
        let cfg = PhaseloopConfig::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: PhaseloopConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()
        .with_context(|| format!("invalid {}", path.display()))?;
    Ok(cfg)
}

/// Atomically write config to disk (temp file + rename).
pub fn write_config(path: &Path, cfg: &PhaseloopConfig) -> Result<()> {
    cfg.validate()?;
    let mut buf = toml::to_string_pretty(cfg).context("serialize config toml")?;
    buf.push('\n');
    write_atomic(path, &buf)
}

fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    let parent = path
        .parent()
        .with_context(|| format!("config path missing parent {}", path.display()))?;
    fs::create_dir_all(parent).with_context(|| format!("create directory {}", parent.display()))?;
    let tmp_path = path.with_extension("toml.tmp");
    fs::write(&tmp_path, contents)
        .with_context(|| format!("write temp config {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("replace config {}", path.display()))?;
    Ok(())
}
