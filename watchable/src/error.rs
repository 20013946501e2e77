//! Error types for the watchable substrate

use thiserror::Error;

/// Errors raised by the logical thread
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WatchableError {
    /// The OS thread backing the logical thread could not be started
    #[error("failed to spawn watchable thread: {0}")]
    Spawn(String),

    /// The logical thread has stopped and no longer accepts work
    #[error("watchable thread has shut down")]
    ShutDown,
}

pub type Result<T> = std::result::Result<T, WatchableError>;
