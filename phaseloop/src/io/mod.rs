//! I/O helpers for phaseloop commands.

pub mod config;
pub mod git;
pub mod process;
pub mod prompt;
pub mod session;
