//! Phase prompts rendered from templates compiled into the binary.

use std::path::Path;

use anyhow::{Context, Result};
use minijinja::{Environment, context};

use crate::core::commit_message::MAX_SUBJECT_CHARS;
use crate::core::marker::Marker;
use crate::core::plan::{LEARNINGS_HEADING, Package};

const TEMPLATES: [(&str, &str); 7] = [
    ("system", include_str!("prompts/system.md")),
    ("plan", include_str!("prompts/plan.md")),
    ("build", include_str!("prompts/build.md")),
    ("learn", include_str!("prompts/learn.md")),
    ("cleanup", include_str!("prompts/cleanup.md")),
    ("explore", include_str!("prompts/explore.md")),
    ("commit_message", include_str!("prompts/commit_message.md")),
];

/// Template engine wrapper around minijinja.
pub struct Prompts {
    env: Environment<'static>,
    plan_file: String,
}

impl Prompts {
    pub fn new(plan_file: &Path) -> Result<Self> {
        let mut env = Environment::new();
        for (name, source) in TEMPLATES {
            env.add_template(name, source)
                .with_context(|| format!("load prompt template {name}"))?;
        }
        Ok(Self {
            env,
            plan_file: plan_file.to_string_lossy().replace('\\', "/"),
        })
    }

    fn render(&self, name: &str, ctx: minijinja::Value) -> Result<String> {
        let template = self.env.get_template(name)?;
        let rendered = template
            .render(ctx)
            .with_context(|| format!("render prompt {name}"))?;
        Ok(rendered.trim().to_string() + "\n")
    }

    fn base_context(&self) -> minijinja::Value {
        context! {
            plan_file => &self.plan_file,
            learnings_heading => LEARNINGS_HEADING,
        }
    }

    pub fn system(&self) -> Result<String> {
        self.render("system", self.base_context())
    }

    pub fn plan(&self, plan_exists: bool) -> Result<String> {
        self.render("plan", context! { plan_exists, ..self.base_context() })
    }

    pub fn build(&self, package: &Package, attempt: u32, max_attempts: u32) -> Result<String> {
        self.render(
            "build",
            context! { package, attempt, max_attempts, ..self.base_context() },
        )
    }

    pub fn learn(&self) -> Result<String> {
        self.render("learn", self.base_context())
    }

    pub fn cleanup(&self) -> Result<String> {
        self.render("cleanup", self.base_context())
    }

    pub fn explore(&self) -> Result<String> {
        self.render("explore", self.base_context())
    }

    /// Summarisation prompt with `diff` cut to `limit` bytes.
    pub fn commit_message(&self, marker: Marker, diff: &str, limit: usize) -> Result<String> {
        let (diff, truncated) = truncate_bytes(diff, limit);
        self.render(
            "commit_message",
            context! {
                kind => marker.as_str(),
                diff => diff.trim_end(),
                truncated,
                limit,
                max_chars => MAX_SUBJECT_CHARS,
            },
        )
    }
}

/// Longest prefix of `text` within `limit` bytes that ends on a char boundary.
pub fn truncate_bytes(text: &str, limit: usize) -> (&str, bool) {
    if text.len() <= limit {
        return (text, false);
    }
    let mut end = limit;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    (&text[..end], true)
}
