//! Line protocol spoken with the engine process.
//!
//! Commands go out as single newline-terminated lines. Every line the engine
//! writes back is classified into an [`EngineEvent`]:
//!
//! - `<<done>> tail` completes the cell in flight; `tail` is its final output
//! - `<<error>> message` is output and marks the cell in flight as failed
//! - `<<question>> prompt` asks the user for an answer
//! - anything else is a chunk of output
//!
//! End of stream is reported by the reader as [`EngineEvent::Disconnect`].

use quill_core::{EngineEvent, EngineReply};
use serde::{Deserialize, Serialize};

/// Line prefixes the engine uses to frame its replies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProtocolMarkers {
    pub done: String,
    pub error: String,
    pub question: String,
}

impl Default for ProtocolMarkers {
    fn default() -> Self {
        Self {
            done: "<<done>>".to_string(),
            error: "<<error>>".to_string(),
            question: "<<question>>".to_string(),
        }
    }
}

/// Turns engine output lines into events.
///
/// Remembers whether an error marker was seen since the last completion so the
/// completion can carry the failure.
#[derive(Debug, Clone, Default)]
pub struct LineClassifier {
    markers: ProtocolMarkers,
    failed: bool,
}

impl LineClassifier {
    pub fn new(markers: ProtocolMarkers) -> Self {
        Self {
            markers,
            failed: false,
        }
    }

    /// Classify one line of engine output.
    pub fn classify(&mut self, line: &str) -> EngineEvent {
        let line = line.trim_end_matches(['\r', '\n']);

        if let Some(tail) = strip_marker(line, &self.markers.done) {
            return EngineEvent::CompleteOutput {
                reply: EngineReply {
                    text: tail.to_string(),
                    failed: std::mem::take(&mut self.failed),
                },
            };
        }

        if let Some(message) = strip_marker(line, &self.markers.error) {
            self.failed = true;
            return EngineEvent::PartialOutput {
                text: format!("{message}\n"),
            };
        }

        if let Some(prompt) = strip_marker(line, &self.markers.question) {
            return EngineEvent::Question {
                prompt: prompt.to_string(),
            };
        }

        EngineEvent::PartialOutput {
            text: format!("{line}\n"),
        }
    }

    /// Forget a pending failure, e.g. after the engine was restarted.
    pub fn reset(&mut self) {
        self.failed = false;
    }
}

fn strip_marker<'a>(line: &'a str, marker: &str) -> Option<&'a str> {
    if marker.is_empty() {
        return None;
    }
    line.strip_prefix(marker).map(str::trim)
}

/// Encode a cell input as one command line.
///
/// Interior newlines are folded into spaces and `terminator` is appended when
/// the input does not already end with it.
pub fn encode_command(input: &str, terminator: Option<&str>) -> String {
    let mut line = input
        .trim()
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect::<Vec<_>>()
        .join(" ");

    if let Some(terminator) = terminator.filter(|t| !t.is_empty()) {
        if !line.ends_with(terminator) {
            line.push_str(terminator);
        }
    }
    line.push('\n');
    line
}
