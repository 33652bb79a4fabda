//! Diagnostic logging setup.

use tracing_subscriber::EnvFilter;

/// Install the global `tracing` subscriber, writing to standard error.
///
/// `--debug` selects the `debug` level, otherwise only warnings are shown.
/// A `RUST_LOG` environment variable overrides both.
pub fn init(debug: bool) {
    let default_level = if debug { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .compact()
        .try_init();
}
