//! Tracing subscriber setup

use tracing_subscriber::EnvFilter;

/// Install a formatted tracing subscriber.
///
/// `RUST_LOG` takes precedence over `default_filter`. Returns `false` when a
/// global subscriber was already installed, which makes repeated calls from
/// tests harmless.
pub fn init_logging(default_filter: &str) -> bool {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    tracing_subscriber::fmt().with_env_filter(filter).with_thread_names(true).try_init().is_ok()
}
