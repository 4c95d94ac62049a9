//! The controller's view of the external engine.
//!
//! The wire encoding belongs to the transport; by the time an event reaches the
//! controller it has been classified into one of the [`EngineEvent`] kinds.

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Final reply for a dispatched cell.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct EngineReply {
    /// Trailing output carried by the completion itself.
    pub text: String,
    /// The engine reported an error for this cell.
    pub failed: bool,
}

/// A classified message from the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EngineEvent {
    /// A chunk of output for the cell in flight.
    PartialOutput { text: String },
    /// The cell in flight is finished.
    CompleteOutput { reply: EngineReply },
    /// The engine asks the user a question mid-evaluation.
    Question { prompt: String },
    /// The connection to the engine is gone.
    Disconnect,
}

/// Request side of the engine connection.
pub trait EngineTransport {
    /// Hand one cell's input to the engine.
    fn send_command(&mut self, command: &str) -> Result<()>;

    /// Answer a question the engine asked.
    fn send_answer(&mut self, answer: &str) -> Result<()> {
        self.send_command(answer)
    }

    /// Abort the evaluation in progress.
    fn interrupt(&mut self) -> Result<()>;

    /// Whether requests can currently reach the engine.
    fn is_connected(&self) -> bool;
}
