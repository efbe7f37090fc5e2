//! Error types for sessionguard.

use thiserror::Error;

/// Failure of a shared activity medium.
///
/// Never fatal: the broadcaster logs it and carries on with local-only tracking.
#[derive(Debug, Error)]
pub enum MediumError {
    /// The backing SQLite file could not be read or written.
    #[error("shared storage error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// The medium is not reachable at all.
    #[error("shared storage unavailable: {0}")]
    Unavailable(String),
}

/// Failure to construct a monitor.
#[derive(Debug, Error)]
pub enum MonitorError {
    /// Timers are scheduled on a tokio runtime; none was running.
    #[error("session monitor requires a tokio runtime: {0}")]
    NoRuntime(#[from] tokio::runtime::TryCurrentError),
}
