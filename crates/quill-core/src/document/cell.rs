//! Group cells and their handles.

use serde::{Deserialize, Serialize};

/// Handle to a group cell inside a [`Worksheet`](super::Worksheet).
///
/// Handles never own the cell. Once the cell is removed its slot generation is
/// bumped, so an old handle no longer resolves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CellId {
    pub(crate) index: u32,
    pub(crate) generation: u32,
}

impl CellId {
    pub(crate) fn new(index: u32, generation: u32) -> Self {
        Self { index, generation }
    }

    /// Slot index of the cell.
    pub fn index(&self) -> usize {
        self.index as usize
    }
}

impl std::fmt::Display for CellId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "cell_{}", self.index)
    }
}

/// Type of group cell in the worksheet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CellKind {
    /// Engine-evaluable input.
    Input,
    /// Free text commentary.
    Text,
    /// Document title (outermost heading).
    Title,
    /// Section heading.
    Section,
    /// Subsection heading.
    Subsection,
    /// Subsubsection heading.
    Subsubsection,
}

impl CellKind {
    /// Heading level, `None` for cells that never start a section.
    pub fn heading_level(&self) -> Option<u8> {
        match self {
            CellKind::Title => Some(1),
            CellKind::Section => Some(2),
            CellKind::Subsection => Some(3),
            CellKind::Subsubsection => Some(4),
            CellKind::Input | CellKind::Text => None,
        }
    }

    /// Whether cells of this kind are sent to the engine.
    pub fn is_input(&self) -> bool {
        matches!(self, CellKind::Input)
    }
}

/// Result of the last evaluation of a cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvaluationOutcome {
    #[default]
    NotEvaluated,
    Evaluating,
    Succeeded,
    Failed,
    Interrupted,
}

impl std::fmt::Display for EvaluationOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let text = match self {
            EvaluationOutcome::NotEvaluated => "not evaluated",
            EvaluationOutcome::Evaluating => "evaluating",
            EvaluationOutcome::Succeeded => "succeeded",
            EvaluationOutcome::Failed => "failed",
            EvaluationOutcome::Interrupted => "interrupted",
        };
        f.write_str(text)
    }
}

/// A node of the worksheet tree.
#[derive(Debug, Clone)]
pub struct GroupCell {
    pub(crate) id: CellId,
    pub(crate) kind: CellKind,
    pub(crate) input: String,
    pub(crate) output: Option<String>,
    pub(crate) outcome: EvaluationOutcome,
    pub(crate) folded: bool,
    pub(crate) parent: Option<CellId>,
    pub(crate) hidden: Vec<CellId>,
}

impl GroupCell {
    pub(crate) fn new(id: CellId, kind: CellKind, input: String) -> Self {
        Self {
            id,
            kind,
            input,
            output: None,
            outcome: EvaluationOutcome::NotEvaluated,
            folded: false,
            parent: None,
            hidden: Vec::new(),
        }
    }

    pub fn id(&self) -> CellId {
        self.id
    }

    pub fn kind(&self) -> CellKind {
        self.kind
    }

    /// Text the user typed into the cell.
    pub fn input(&self) -> &str {
        &self.input
    }

    /// Output written back by the last evaluation.
    pub fn output(&self) -> Option<&str> {
        self.output.as_deref()
    }

    pub fn outcome(&self) -> EvaluationOutcome {
        self.outcome
    }

    pub fn is_folded(&self) -> bool {
        self.folded
    }

    /// Whether the cell owns a nested subtree, independent of fold state.
    pub fn has_hidden_children(&self) -> bool {
        !self.hidden.is_empty()
    }

    pub fn is_input_cell(&self) -> bool {
        self.kind.is_input()
    }

    /// Enclosing folded heading, if this cell is hidden.
    pub fn parent(&self) -> Option<CellId> {
        self.parent
    }

    /// Marks the start of an evaluation and drops the stale output.
    pub(crate) fn begin_evaluation(&mut self) {
        self.outcome = EvaluationOutcome::Evaluating;
        self.output = None;
    }

    pub(crate) fn finish_evaluation(&mut self, outcome: EvaluationOutcome, output: Option<String>) {
        self.outcome = outcome;
        self.output = output;
    }
}
