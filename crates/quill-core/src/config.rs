//! Controller configuration.

use serde::{Deserialize, Serialize};

/// What happens to the cells still waiting when evaluation is cut short.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueuePolicy {
    /// Drop every pending cell.
    #[default]
    Clear,
    /// Keep pending cells for a later resume.
    Preserve,
}

/// Policies of the evaluation controller.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerConfig {
    /// Pending cells after the engine connection is lost.
    pub on_disconnect: QueuePolicy,
    /// Pending cells after the user interrupts an evaluation.
    pub on_interrupt: QueuePolicy,
}
