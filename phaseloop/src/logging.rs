//! Tracing setup and user-facing status lines.
//!
//! # Separation of Concerns
//!
//! - **Tracing**: dev diagnostics via `RUST_LOG`, output to stderr. Agent
//!   events (tool starts, turn text) are `info!` records.
//!
//! - **Notices** ([`notice`]): short status lines for the person running the
//!   loop, always printed, prefixed with `[phaseloop]`.

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Prefix of every user-facing status line.
pub const NOTICE_PREFIX: &str = "[phaseloop] ";

/// Initialize tracing subscriber for development logging.
///
/// Reads `RUST_LOG` env var. Defaults to `warn` if unset.
/// Output: stderr, compact format.
///
/// # Example
/// ```bash
/// RUST_LOG=phaseloop=info phaseloop loop
/// ```
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).compact())
        .init();
}

/// Format a status line.
pub fn notice_line(message: &str) -> String {
    format!("{NOTICE_PREFIX}{message}")
}

/// Print a status line to stderr.
pub fn notice(message: &str) {
    eprintln!("{}", notice_line(message));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn notices_carry_the_prefix() {
        assert_eq!(notice_line("idle"), "[phaseloop] idle");
    }
}
