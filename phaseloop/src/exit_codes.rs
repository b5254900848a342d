//! Stable exit codes for phaseloop CLI commands.

/// Command succeeded (a step ran, or was interrupted by a guard).
pub const OK: i32 = 0;
/// Command failed due to invalid config, git, agent or other errors.
pub const INVALID: i32 = 1;
/// `phaseloop step` found nothing to do.
pub const IDLE: i32 = 2;
