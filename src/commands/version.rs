//! Command: print version information.
use crate::logging::Log;

/// Build version: `IISUTIL_VERSION` at build time, else the package version.
#[must_use]
pub fn version() -> &'static str {
    option_env!("IISUTIL_VERSION").unwrap_or(env!("CARGO_PKG_VERSION"))
}

/// Log the version line.
pub fn run(log: &dyn Log) {
    log.info(&format!("iisutil {}", version()));
}
