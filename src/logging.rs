//! Tracing subscriber setup for the `carag` binary.
//!
//! Logs go to stderr so stdout stays reserved for answers and JSON output.
//! `RUST_LOG` overrides the default level; `--verbose` raises it to `info`.

use tracing_subscriber::EnvFilter;

/// Install the global subscriber. Safe to call more than once; only the
/// first call takes effect.
pub fn init_logging(verbose: bool) {
    let default_level = if verbose { "info" } else { "warn" };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
