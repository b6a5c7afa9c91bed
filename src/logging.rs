//! Diagnostic logging for the module binaries.
//!
//! stdout carries the JSON outcome, so every log line goes to stderr.
//! `RUST_LOG` filters (default `info`); `RUST_LOG_FORMAT=json` switches to
//! JSON lines. `log` records from the client crate are bridged into tracing.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

pub fn init() {
    init_with_defaults("info");
}

pub fn init_with_defaults(default_filter: &str) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    let format = std::env::var("RUST_LOG_FORMAT").unwrap_or_default();

    let result = match format.as_str() {
        "json" => tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().with_ansi(false).json().with_writer(std::io::stderr))
            .try_init(),
        _ => tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().with_ansi(false).compact().with_writer(std::io::stderr))
            .try_init(),
    };

    // Already initialised (tests, embedding).
    if let Err(e) = result {
        tracing::debug!("tracing already initialised: {e}");
    }
}
