//! Engine process configuration.

use serde::{Deserialize, Serialize};

use crate::protocol::ProtocolMarkers;

/// How to start and talk to the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Program to run, either a path or a name looked up in PATH.
    pub program: String,
    /// Arguments passed to the program.
    pub args: Vec<String>,
    /// Appended to every command that does not already end with it.
    pub command_terminator: Option<String>,
    /// Reply framing.
    pub markers: ProtocolMarkers,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            program: "quill-engine".to_string(),
            args: Vec::new(),
            command_terminator: None,
            markers: ProtocolMarkers::default(),
        }
    }
}

impl EngineConfig {
    /// Config for `program` with default framing.
    pub fn for_program(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            ..Self::default()
        }
    }

    /// Append an argument.
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }
}
