//! Diagnostic logging setup.
//!
//! Diagnostics go to stderr through `tracing`, filtered by the
//! `MERGE_BISECT_LOG` environment variable (e.g. `MERGE_BISECT_LOG=debug`).
//! Only warnings are shown by default so the normal output stays readable.

use tracing_subscriber::EnvFilter;

/// Environment variable holding the log filter directive.
pub const LOG_ENV: &str = "MERGE_BISECT_LOG";

/// Default filter when `MERGE_BISECT_LOG` is unset or invalid.
const DEFAULT_FILTER: &str = "warn";

/// Build the filter from the environment, falling back to the default.
pub fn env_filter() -> EnvFilter {
    EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

/// Install the global subscriber. Does nothing if one is already set.
pub fn init() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time()
        .try_init();
}
