//! Worksheet cell tree.
//!
//! This module provides:
//! - Generational cell handles that tolerate deletion
//! - Group cells with foldable (hidden) subtrees
//! - The `CellTree` capability the evaluation queue reads through

mod cell;
mod worksheet;

pub use cell::{CellId, CellKind, EvaluationOutcome, GroupCell};
pub use worksheet::{CellTree, Worksheet};
