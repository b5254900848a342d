//! Git-driven development loop for coding agents.
//!
//! Every invocation reads the repository fresh, infers the next phase from
//! the marker glyph on the latest commit subject, runs that phase through an
//! agent CLI and commits the result under a new marker. The architecture
//! enforces a strict separation:
//!
//! - **[`core`]**: Pure, deterministic logic (markers, diff parsing, hunk
//!   classification, plan and learnings parsing, step inference). No I/O.
//! - **[`io`]**: Side-effecting operations (git, subprocesses, config, prompt
//!   rendering, session storage).
//! - **[`agent`]**: Provider adapters that stream agent CLI output as events,
//!   plus the guard and fallback wrappers.
//!
//! Orchestration modules ([`harvest`], [`phases`], [`step`], [`looping`])
//! coordinate core logic with I/O to implement CLI commands.

pub mod agent;
pub mod core;
pub mod exit_codes;
pub mod harvest;
pub mod io;
pub mod logging;
pub mod looping;
pub mod phases;
pub mod step;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
