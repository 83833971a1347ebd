//! Trace logging setup
//!
//! Library crates emit `tracing` events; the binary decides whether anyone
//! listens. Output goes to stderr so it never mixes with the manifests.

use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Install the process-wide subscriber
///
/// `RUST_LOG` always wins. Without it, tracing stays off unless `debug` is set.
pub fn init(debug: bool) {
    let filter = match std::env::var(EnvFilter::DEFAULT_ENV) {
        Ok(value) if !value.is_empty() => EnvFilter::new(value),
        _ if debug => EnvFilter::new("debug"),
        _ => EnvFilter::new("off"),
    };

    let _ = tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .with(filter)
        .try_init();
}
