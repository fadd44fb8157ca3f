use std::io;
use thiserror::Error;

/// Error type for consumer pool operations.
#[derive(Error, Debug)]
pub enum PoolError {
    /// IO error, e.g. a worker thread could not be spawned.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// Serialization/deserialization error.
    #[error("Serde error: {0}")]
    Serde(#[from] serde_json::Error),

    /// The pool was configured with a non-positive number of workers.
    #[error("Pool size must be a positive integer, got {0}")]
    InvalidSize(usize),

    /// `start` was called on a pool that is already running.
    #[error("Pool has already been started")]
    AlreadyStarted,

    /// `join` was called on a pool that was never started.
    #[error("Pool has not been started")]
    NotStarted,

    /// A worker thread terminated by panicking.
    #[error("Worker thread {0} panicked")]
    WorkerPanicked(String),

    /// Error with a plain message.
    #[error("{0}")]
    StringError(String),
}

/// Result type alias for consumer pool operations.
pub type Result<T> = std::result::Result<T, PoolError>;
