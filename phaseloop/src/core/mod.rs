//! Deterministic, pure logic shared by the workflow.
//!
//! Core modules must be free of I/O side effects. They operate on in-memory
//! data (commit subjects, diff text, plan text) and return deterministic
//! outputs suitable for tests.

pub mod classifier;
pub mod commit_message;
pub mod diff;
pub mod learnings;
pub mod marker;
pub mod plan;
pub mod workflow;
