//! Evaluation scheduling core for quill worksheets.
//!
//! This crate provides:
//! - An arena-backed worksheet tree with foldable sections
//! - The FIFO evaluation queue of cells awaiting the engine
//! - The engine status state machine that drives toolbar state
//! - The controller that dispatches cells one at a time

pub mod config;
pub mod controller;
pub mod document;
pub mod engine;
pub mod error;
pub mod queue;
pub mod status;

pub use config::{ControllerConfig, QueuePolicy};
pub use controller::{EvaluationContext, EvaluationController, StatusObserver};
pub use document::{CellId, CellKind, CellTree, EvaluationOutcome, GroupCell, Worksheet};
pub use engine::{EngineEvent, EngineReply, EngineTransport};
pub use error::{Error, Result};
pub use queue::EvaluationQueue;
pub use status::{
    Activity, ActivityResult, Affordances, EngineStatus, QueueIndicator, StatusChange,
    StatusMachine,
};
