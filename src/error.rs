//! Error types for the toolkit

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for toolkit operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types that can occur across the toolkit
#[derive(Debug, Error)]
pub enum Error {
    /// A worker's one-time kernel setup failed before it reached READY.
    /// Fatal to the whole pool.
    #[error("worker {worker} failed during setup: {message}")]
    SetupFailed {
        /// Index of the worker whose setup failed
        worker: usize,
        /// Description of the underlying failure
        message: String,
    },

    /// A worker terminated mid-round; its channel went silent during
    /// processing. Fatal to the whole pool.
    #[error("worker {worker} terminated during processing")]
    WorkerLost {
        /// Index of the lost worker
        worker: usize,
    },

    /// A worker thread panicked and could not be joined cleanly
    #[error("worker {0} panicked")]
    WorkerPanicked(usize),

    /// Channel send error
    #[error("channel send failed: {0}")]
    Send(String),

    /// Channel receive error
    #[error("channel receive failed: {0}")]
    Receive(String),

    /// A timed channel operation ran out of time
    #[error("operation timed out")]
    Timeout,

    /// The pool was already stopped when an operation was attempted
    #[error("pool has been stopped")]
    PoolStopped,

    /// A kernel reported a domain-level failure
    #[error("kernel error: {0}")]
    Kernel(String),

    /// The on-disk cache could not serve this file; the caller should fall
    /// back to re-parsing the source. Recoverable.
    #[error("cache miss: {0}")]
    CacheMiss(String),

    /// The cache could not be written
    #[error("cache failure: {0}")]
    Cache(String),

    /// An event file could not be understood at load time
    #[error("incompatible data in {path}: {reason}")]
    IncompatibleData {
        /// File that failed to parse
        path: PathBuf,
        /// What was wrong with it
        reason: String,
    },

    /// An event table was constructed or extended inconsistently
    #[error("malformed table: {0}")]
    MalformedTable(String),

    /// Invalid configuration
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Underlying I/O error
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Configuration file could not be decoded
    #[error("configuration parse error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Whether this error is the recoverable cache-miss condition
    pub fn is_cache_miss(&self) -> bool {
        matches!(self, Error::CacheMiss(_))
    }
}

impl<T> From<flume::SendError<T>> for Error {
    fn from(err: flume::SendError<T>) -> Self {
        Error::Send(err.to_string())
    }
}

impl From<flume::RecvError> for Error {
    fn from(err: flume::RecvError) -> Self {
        Error::Receive(err.to_string())
    }
}

impl<T> From<crossbeam::channel::SendError<T>> for Error {
    fn from(err: crossbeam::channel::SendError<T>) -> Self {
        Error::Send(err.to_string())
    }
}

impl From<crossbeam::channel::RecvError> for Error {
    fn from(err: crossbeam::channel::RecvError) -> Self {
        Error::Receive(err.to_string())
    }
}
