//! Error types for quill-core.

use thiserror::Error;

use crate::document::CellId;

/// Result type for quill-core operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in quill-core.
#[derive(Debug, Error)]
pub enum Error {
    /// Cell handle does not resolve (never existed or was removed).
    #[error("cell not found: {0}")]
    CellNotFound(CellId),

    /// The engine connection is gone.
    #[error("not connected to engine")]
    NotConnected,

    /// Communication error with the engine process.
    #[error("IPC error: {0}")]
    Ipc(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid operation (e.g., folding an input cell).
    #[error("invalid operation: {0}")]
    InvalidOperation(String),
}
