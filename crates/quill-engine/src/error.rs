//! Error types for the engine transport and session.

/// Engine error type.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Scheduling core error.
    #[error("Core error: {0}")]
    Core(#[from] quill_core::Error),

    /// The engine program could not be located.
    #[error("Engine program not found: {0}")]
    ProgramNotFound(String),

    /// The engine process could not be started.
    #[error("Failed to spawn engine '{program}': {message}")]
    Spawn { program: String, message: String },

    /// The session task is no longer running.
    #[error("Session closed")]
    SessionClosed,

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for engine operations.
pub type EngineResult<T> = std::result::Result<T, EngineError>;
