//! Error types for process capture and pattern waits

use std::io;
use std::time::Duration;
use thiserror::Error;

/// Errors surfaced by session and log operations
#[derive(Debug, Error)]
pub enum ProcessError {
    /// Failed to spawn or reap the child process
    #[error("process I/O failed: {0}")]
    Io(#[from] io::Error),

    /// Pattern wait exceeded its timeout without a match
    #[error("timeout of {timeout:?} exceeded while waiting for output matching '{pattern}'")]
    PatternTimeout { pattern: String, timeout: Duration },

    /// Stream ended before the awaited pattern appeared
    #[error("EOF reached while waiting for output matching '{pattern}'")]
    UnexpectedEof { pattern: String },

    /// Caller named a stream other than out/err
    #[error("unknown stream '{0}'")]
    UnknownStream(String),

    /// Session has no live process (never started, or already reaped)
    #[error("session has no live process")]
    NotRunning,

    /// Session was already started
    #[error("session already started")]
    AlreadyStarted,

    /// Invalid session configuration
    #[error("invalid session configuration: {0}")]
    InvalidConfig(String),

    /// Failed to deliver a signal to the process
    #[cfg(unix)]
    #[error("failed to signal process {pid}: {source}")]
    Signal { pid: u32, source: nix::Error },
}

/// Result type for session and log operations
pub type Result<T> = std::result::Result<T, ProcessError>;
