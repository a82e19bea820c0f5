//! Logging bootstrap for the `calculator` binary.
//!
//! Filter precedence: `RUST_LOG`, then the `-v` count, then `logging.level`.

use tracing_subscriber::EnvFilter;

use crate::config::LoggingConfig;

/// Filter directive implied by the number of `-v` flags, if any.
#[must_use]
pub fn verbosity_directive(verbose: u8) -> Option<&'static str> {
    match verbose {
        0 => None,
        1 => Some("info"),
        2 => Some("debug"),
        _ => Some("trace"),
    }
}

/// Resolve the effective filter without consulting `RUST_LOG`.
#[must_use]
pub fn default_directive(cfg: &LoggingConfig, verbose: u8) -> String {
    verbosity_directive(verbose).map_or_else(|| cfg.level.clone(), str::to_owned)
}

/// Install the global subscriber. Safe to call more than once; later calls
/// are ignored.
pub fn init(cfg: &LoggingConfig, verbose: u8) {
    let directive = default_directive(cfg, verbose);
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&directive))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_target(true);
    let installed = if cfg.json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };

    if installed.is_ok() {
        tracing::debug!(filter = %directive, json = cfg.json, "logging initialized");
    }
}
