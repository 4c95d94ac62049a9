//! Engine status state machine.
//!
//! Tracks the relationship between the editor and the engine and decides when
//! the host UI has to refresh its status display and toolbar.
//!
//! Precedence rules:
//! - A save/export activity suppresses notifications but the state value is
//!   still recorded, so finishing the activity can re-render it.
//! - The force flag overrides the "unchanged state" no-op exactly once.

use serde::{Deserialize, Serialize};

/// State of the engine connection as seen by the editor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineStatus {
    /// Idle, ready for user input.
    Waiting,
    /// The engine asked a question and is blocked on the answer.
    UserInput,
    /// The engine is computing a dispatched cell.
    Calculating,
    /// The engine is streaming output back.
    Transferring,
    /// A complete reply is being applied to the worksheet.
    Parsing,
    /// No live connection to the engine.
    Disconnected,
}

impl EngineStatus {
    /// Status bar text for this state.
    pub fn label(&self) -> &'static str {
        match self {
            EngineStatus::Waiting => "Ready for user input",
            EngineStatus::UserInput => "Engine has a question",
            EngineStatus::Calculating => "Engine is calculating",
            EngineStatus::Transferring => "Reading engine output",
            EngineStatus::Parsing => "Parsing output",
            EngineStatus::Disconnected => "Not connected to engine",
        }
    }

    /// Whether the engine is working on a cell.
    pub fn is_busy(&self) -> bool {
        matches!(
            self,
            EngineStatus::Calculating | EngineStatus::Transferring | EngineStatus::Parsing
        )
    }

    /// Toolbar and menu state for this status.
    ///
    /// `scrolled_away` tells whether the view has left the evaluating cell;
    /// "follow" is only offered then.
    pub fn affordances(&self, scrolled_away: bool) -> Affordances {
        match self {
            EngineStatus::Waiting => Affordances {
                interrupt: false,
                follow: false,
                remove_output: true,
                awaiting_answer: false,
            },
            EngineStatus::UserInput => Affordances {
                interrupt: true,
                follow: true,
                remove_output: false,
                awaiting_answer: true,
            },
            EngineStatus::Calculating | EngineStatus::Transferring | EngineStatus::Parsing => {
                Affordances {
                    interrupt: true,
                    follow: scrolled_away,
                    remove_output: false,
                    awaiting_answer: false,
                }
            }
            EngineStatus::Disconnected => Affordances::default(),
        }
    }
}

impl std::fmt::Display for EngineStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Which user actions are currently enabled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Affordances {
    /// Interrupt the running evaluation.
    pub interrupt: bool,
    /// Scroll back to the evaluating cell.
    pub follow: bool,
    /// Remove all output from the worksheet.
    pub remove_output: bool,
    /// Show the "engine has a question" indicator instead of "follow".
    pub awaiting_answer: bool,
}

/// Notification emitted when the rendered status has to change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusChange {
    pub old: EngineStatus,
    pub new: EngineStatus,
    /// Rendered because of the force flag, not because the value changed.
    pub forced: bool,
    pub affordances: Affordances,
}

/// Long-running document operation that owns the status bar meanwhile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Activity {
    #[default]
    Idle,
    Saving,
    Exporting,
}

/// What the host should show after a save/export finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivityResult {
    /// Re-render the engine status.
    Status(StatusChange),
    /// Show a plain status bar message.
    Message(&'static str),
}

/// The status state machine of one session.
#[derive(Debug)]
pub struct StatusMachine {
    current: EngineStatus,
    force_refresh: bool,
    activity: Activity,
    scrolled_away: bool,
}

impl StatusMachine {
    /// Start out disconnected with the force flag set, so the first real
    /// state is always rendered even when it matches the initial value.
    pub fn new() -> Self {
        Self {
            current: EngineStatus::Disconnected,
            force_refresh: true,
            activity: Activity::Idle,
            scrolled_away: false,
        }
    }

    /// Current state value, whether or not it is displayed.
    pub fn current(&self) -> EngineStatus {
        self.current
    }

    pub fn activity(&self) -> Activity {
        self.activity
    }

    /// Request that the next [`set`](Self::set) renders even if unchanged.
    pub fn force_refresh(&mut self) {
        self.force_refresh = true;
    }

    pub fn set_scrolled_away(&mut self, scrolled_away: bool) {
        self.scrolled_away = scrolled_away;
    }

    /// Toolbar state for the current status.
    pub fn affordances(&self) -> Affordances {
        self.current.affordances(self.scrolled_away)
    }

    /// Record a new state.
    ///
    /// Returns the change to render, or `None` when the value is unchanged and
    /// not forced, or while an activity owns the status bar.
    pub fn set(&mut self, status: EngineStatus) -> Option<StatusChange> {
        let forced = self.force_refresh;
        let render = (status != self.current || forced) && self.activity == Activity::Idle;
        let change = render.then(|| StatusChange {
            old: self.current,
            new: status,
            forced: forced && status == self.current,
            affordances: status.affordances(self.scrolled_away),
        });

        self.current = status;
        self.force_refresh = false;
        change
    }

    /// Enter a save or export. Returns the status bar text to show.
    pub fn begin_activity(&mut self, activity: Activity) -> &'static str {
        self.force_refresh = true;
        self.activity = activity;
        match activity {
            Activity::Saving => "Saving...",
            Activity::Exporting => "Exporting...",
            Activity::Idle => self.current.label(),
        }
    }

    /// Leave the current save or export.
    pub fn finish_activity(&mut self, success: bool) -> ActivityResult {
        let activity = std::mem::take(&mut self.activity);
        self.force_refresh = true;

        if !success {
            return ActivityResult::Message(match activity {
                Activity::Exporting => "Export failed.",
                _ => "Saving failed.",
            });
        }

        if self.current != EngineStatus::Waiting {
            if let Some(change) = self.set(self.current) {
                return ActivityResult::Status(change);
            }
        }

        ActivityResult::Message(match activity {
            Activity::Exporting => "Export successful.",
            _ => "Saving successful.",
        })
    }
}

impl Default for StatusMachine {
    fn default() -> Self {
        Self::new()
    }
}

/// Status bar cell counter.
#[derive(Debug, Default)]
pub struct QueueIndicator {
    last: usize,
}

impl QueueIndicator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Text to display for a new queue length, `None` if it did not change.
    pub fn update(&mut self, len: usize) -> Option<String> {
        if len == self.last {
            return None;
        }
        self.last = len;
        Some(if len > 0 {
            format!("{} cells in evaluation queue", len)
        } else {
            "Welcome to quill".to_string()
        })
    }
}
