//! Logger facade used by the command layer.
use std::path::{Path, PathBuf};

use super::utils::log_file_path;
use super::{DRY_RUN_TARGET, STAGE_TARGET};
use crate::error::ErrorCode;

/// Logging sink the command layer writes through.
///
/// [`Logger`] forwards to [`tracing`]; tests can substitute a recorder.
pub trait Log {
    /// Log a stage header (one per command).
    fn stage(&self, msg: &str);
    /// Log an informational message.
    fn info(&self, msg: &str);
    /// Log a debug message (console only when verbose).
    fn debug(&self, msg: &str);
    /// Log a warning message.
    fn warn(&self, msg: &str);
    /// Log an error message.
    fn error(&self, msg: &str);
    /// Log a dry-run notice.
    fn dry_run(&self, msg: &str);
}

/// [`Log`] implementation emitting `tracing` events.
///
/// Everything also lands in `<cache>/iisutil/<command>.log` through the file
/// layer installed by [`init_subscriber`](super::init_subscriber).
#[derive(Debug)]
pub struct Logger {
    log_file: Option<PathBuf>,
}

impl Logger {
    /// Create a logger for `command`.
    ///
    /// Only remembers where the log file lives; the file itself is written
    /// by the subscriber.
    #[must_use]
    pub fn new(command: &str) -> Self {
        Self {
            log_file: log_file_path(command),
        }
    }

    /// Path of the persistent log file, if the cache directory is usable.
    #[must_use]
    pub fn log_path(&self) -> Option<&Path> {
        self.log_file.as_deref()
    }

    /// Log the final outcome line of an invocation.
    ///
    /// For a `query` verb the site-exists and site-not-found codes are the
    /// answer and are logged at info.
    pub fn result(&self, code: ErrorCode, query: bool) {
        let line = format!("Execute Result: {}", code.code());
        let answer = query && matches!(code, ErrorCode::SiteExists | ErrorCode::SiteNotFound);
        if code.is_success() {
            self.info(&line);
        } else if answer {
            self.info(&format!("{line} ({})", code.name()));
        } else {
            self.error(&format!("{line} ({})", code.name()));
        }
        if let Some(path) = &self.log_file {
            self.debug(&format!("log: {}", path.display()));
        }
    }
}

impl Log for Logger {
    fn stage(&self, msg: &str) {
        tracing::info!(target: STAGE_TARGET, "{msg}");
    }

    fn info(&self, msg: &str) {
        tracing::info!("{msg}");
    }

    fn debug(&self, msg: &str) {
        tracing::debug!("{msg}");
    }

    fn warn(&self, msg: &str) {
        tracing::warn!("{msg}");
    }

    fn error(&self, msg: &str) {
        tracing::error!("{msg}");
    }

    fn dry_run(&self, msg: &str) {
        tracing::info!(target: DRY_RUN_TARGET, "{msg}");
    }
}
