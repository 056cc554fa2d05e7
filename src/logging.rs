//! logging
//!
//! Diagnostic logging via `tracing`.
//!
//! The filter comes from `CREDBRIDGE_LOG` when set (standard `EnvFilter`
//! directives), otherwise `warn`, or `debug` under `--debug`. Logs go to
//! stderr so they never mix with command output. Credential values are never
//! logged.

use tracing::level_filters::LevelFilter;
use tracing_subscriber::fmt;
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

/// Environment variable holding filter directives.
pub const LOG_ENV: &str = "CREDBRIDGE_LOG";

/// Default level for the given flag.
pub fn default_level(debug: bool) -> LevelFilter {
    if debug {
        LevelFilter::DEBUG
    } else {
        LevelFilter::WARN
    }
}

/// Install the global subscriber.
///
/// Safe to call more than once; later calls are ignored.
pub fn init(debug: bool) {
    let filter = EnvFilter::builder()
        .with_default_directive(default_level(debug).into())
        .with_env_var(LOG_ENV)
        .from_env_lossy();

    let layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(debug)
        .with_thread_names(debug);

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(layer)
        .try_init();
}
