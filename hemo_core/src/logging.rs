//! Tracing setup shared by the `hemo` binary and the test suite.
//!
//! Output goes to stderr so commands that print JSON keep stdout clean.

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Crates whose events follow the requested level; everything else logs
/// warnings only
const OWN_CRATES: [&str; 2] = ["hemo_core", "hemo_cli"];

/// Install the global subscriber at `info`
pub fn init() {
    init_with_level("info")
}

/// Install the global subscriber with `level` for hemo's own crates
///
/// `RUST_LOG`, when set, replaces the computed filter entirely.
pub fn init_with_level(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter(level));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact().with_writer(std::io::stderr))
        .init();
}

fn default_filter(level: &str) -> EnvFilter {
    let directives = OWN_CRATES
        .iter()
        .map(|krate| format!("{}={}", krate, level))
        .collect::<Vec<_>>()
        .join(",");
    EnvFilter::new(format!("warn,{}", directives))
}

/// Route debug output through the test harness; safe to call repeatedly
#[cfg(test)]
pub fn init_test() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_env_filter(default_filter("debug"))
        .try_init();
}
