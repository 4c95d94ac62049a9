//! Engine process transport for quill.
//!
//! This crate provides:
//! - The line protocol spoken with the engine process
//! - `EngineProcess`, a tokio child process implementing `EngineTransport`
//! - `WorksheetSession`, the actor that owns a worksheet and its controller

pub mod config;
pub mod error;
pub mod process;
pub mod protocol;
pub mod session;

pub use config::EngineConfig;
pub use error::{EngineError, EngineResult};
pub use process::EngineProcess;
pub use protocol::{LineClassifier, ProtocolMarkers, encode_command};
pub use session::{
    BroadcastObserver, SessionHandle, SessionMessage, SessionRequest, WorksheetSession,
};
