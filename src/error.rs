//! Error types for the dialogue engine.

use crate::conversation::log::LogError;
use crate::provider::BackendError;

/// Top-level error type for the dialogue session engine.
///
/// Backend failures keep their original [`BackendError`] so the error
/// classifier can read the metadata attached by the provider layer.
#[derive(Debug, thiserror::Error)]
pub enum DialogueError {
    /// Failure raised by the generation backend (open or mid-stream).
    #[error("backend error: {0}")]
    Backend(#[from] BackendError),

    /// The caller supplied input the engine cannot accept.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Configuration could not be read, parsed, or validated.
    #[error("config error: {0}")]
    Config(String),

    /// A conversation log invariant was violated.
    #[error("log error: {0}")]
    Log(#[from] LogError),

    /// The async runtime needed to drive a turn is unavailable.
    #[error("runtime error: {0}")]
    Runtime(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl DialogueError {
    /// Returns true when the failure was raised locally rather than by the backend.
    pub fn is_local(&self) -> bool {
        !matches!(self, Self::Backend(_))
    }
}

/// Convenience result type.
pub type Result<T> = std::result::Result<T, DialogueError>;
